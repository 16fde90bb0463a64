use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::BlobError;
use crate::traits::BlobStore;

/// FileStore is a BlobStore implementation backed by the local filesystem.
///
/// Keys are mapped to paths under `base_dir`:
///   key "img/pikachu.jpg" → `{base_dir}/img/pikachu.jpg`
///
/// Parent directories are created automatically on `put`.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new FileStore rooted at `base_dir`.
    /// The directory is created if it doesn't exist.
    pub fn open(base_dir: &Path) -> Result<Self, BlobError> {
        fs::create_dir_all(base_dir).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Resolve a key to a filesystem path.
    ///
    /// Only plain relative components are accepted, so a key can never
    /// point outside `base_dir`.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        if key.is_empty() || key.contains('\\') {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        let rel = Path::new(key);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(rel))
    }
}

impl BlobStore for FileStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlobError::Io(e.to_string()))?;
        }
        fs::write(&path, data).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Some(data))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| BlobError::Io(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.put("img/pikachu.jpg", b"\xff\xd8jpeg").unwrap();
        assert!(dir.path().join("img/pikachu.jpg").is_file());
        assert_eq!(
            store.get("img/pikachu.jpg").unwrap().as_deref(),
            Some(&b"\xff\xd8jpeg"[..])
        );

        store.delete("img/pikachu.jpg").unwrap();
        assert!(!dir.path().join("img/pikachu.jpg").exists());
        assert!(store.get("img/pikachu.jpg").unwrap().is_none());
    }

    #[test]
    fn delete_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.delete("img/none.png").unwrap();
    }

    #[test]
    fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for key in ["", "/etc/passwd", "../outside", "img/../../x", "img\\x.png", "./img"] {
            assert!(
                matches!(store.put(key, b"x"), Err(BlobError::InvalidKey(_))),
                "key {key:?} accepted"
            );
        }
    }
}
