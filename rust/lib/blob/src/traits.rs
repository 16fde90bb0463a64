use crate::error::BlobError;

/// BlobStore holds uploaded files (card images).
///
/// Keys are relative, path-like strings such as `img/pikachu.jpg`; the key is
/// what the catalogue stores in a card's `image` column.
pub trait BlobStore: Send + Sync {
    /// Store a blob. Overwrites if the key already exists.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Retrieve a blob. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. No-op if the key does not exist.
    fn delete(&self, key: &str) -> Result<(), BlobError>;
}
