//! Server-side configuration file.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [storage]
//! data_dir = "/var/lib/cardex"
//! # sqlite_path = "/var/lib/cardex/catalog.sqlite"
//! # blob_dir = "/var/lib/cardex/media"
//!
//! [media]
//! url = "/media/"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cardex_core::ServiceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSection {
    #[serde(default = "default_media_url")]
    pub url: String,
}

/// Contents of the `cardexd` TOML file. Every section and key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub media: MediaSection,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sqlite_path: None,
            blob_dir: None,
        }
    }
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            url: default_media_url(),
        }
    }
}

fn default_listen() -> String {
    ServiceConfig::default().listen
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_media_url() -> String {
    ServiceConfig::default().media_url
}

impl ServerConfig {
    /// Resolve a context name or path to a config file path.
    ///
    /// Anything containing `/` or `.` is taken as a path; a bare name maps to
    /// `/etc/cardex/<name>.toml`.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/cardex/{}.toml", name_or_path))
        }
    }

    /// Load config from disk, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Build the runtime configuration. `listen` overrides `[server] listen`.
    pub fn service_config(&self, listen: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            data_dir: Some(PathBuf::from(&self.storage.data_dir)),
            sqlite_path: self.storage.sqlite_path.as_ref().map(PathBuf::from),
            blob_dir: self.storage.blob_dir.as_ref().map(PathBuf::from),
            listen: listen.unwrap_or(&self.server.listen).to_string(),
            media_url: self.media.url.clone(),
        }
    }
}
