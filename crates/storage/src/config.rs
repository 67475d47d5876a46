//! Storage configuration via `worldstore.toml`
//!
//! On first use a commented default `worldstore.toml` is written into the
//! server's data directory. To change settings, edit the file and restart.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use worldstore_core::{Error, Result};

use crate::backend::StorageOptions;

/// Config file name placed in the server data directory.
pub const CONFIG_FILE_NAME: &str = "worldstore.toml";

/// Storage configuration loaded from `worldstore.toml`.
///
/// # Example
///
/// ```toml
/// root = "worlds"
/// compression = false
/// flush_on_close = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory under which location namespaces are resolved.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Forwarded to backends as `StorageOptions::compression`.
    #[serde(default)]
    pub compression: bool,
    /// Flush every cached container before closing locations in
    /// `StorageManager::close_all`.
    #[serde(default)]
    pub flush_on_close: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("worlds")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            compression: false,
            flush_on_close: false,
        }
    }
}

impl StorageConfig {
    /// Options handed to every backend opened under this config.
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions::default().with_compression(self.compression)
    }

    /// Full namespace for a location path, resolved against `root`.
    pub fn namespace_for(&self, path: &str) -> String {
        self.root.join(path).to_string_lossy().into_owned()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Worldstore configuration
#
# Base directory under which storage location namespaces are resolved.
root = "worlds"

# Ask backends to compress stored values (default: false).
compression = false

# Flush every cached container when all locations are closed together
# (default: false). Closing a single location never flushes.
flush_on_close = false
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not a valid config.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load `worldstore.toml` from `dir`, writing the default file first if
    /// it does not exist yet.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            std::fs::write(&path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!(path = %path.display(), "Wrote default storage config");
        }
        Self::from_file(&path)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
