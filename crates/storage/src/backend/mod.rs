//! Storage backend abstraction
//!
//! A backend is an opaque byte store addressed by string keys. It knows
//! nothing about data types, containers, or caching; the storage location
//! layered on top owns all of that.
//!
//! Backends are swappable: files, a database, or plain memory all satisfy
//! the same contract.

mod memory;

pub use memory::MemoryBackend;

use serde::{Deserialize, Serialize};
use worldstore_core::BackendError;

/// Result type for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Options handed to a backend when it is opened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    /// Ask the backend to compress stored values
    #[serde(default)]
    pub compression: bool,
}

impl StorageOptions {
    /// Options with compression toggled
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }
}

/// Raw key-value store behind a storage location
///
/// Thread safety: every method takes `&self` and must be safe to call from
/// several threads (requires Send + Sync). Calls may block the calling
/// thread; the storage layer does not add its own thread pool.
///
/// # Parallel I/O
///
/// `supports_parallel_loading` / `supports_parallel_saving` advertise whether
/// a caller may issue concurrent reads or writes for different keys. Both
/// default to `false`.
pub trait StorageBackend: Send + Sync {
    /// Open the store for `namespace`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be opened.
    fn open(&self, namespace: &str, options: &StorageOptions) -> BackendResult<()>;

    /// Get the bytes stored under `key`
    ///
    /// Returns None if the key has no stored bytes.
    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Store `data` under `key`, replacing any previous bytes
    fn set(&self, key: &str, data: &[u8]) -> BackendResult<()>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&self, key: &str) -> BackendResult<()>;

    /// Close the store
    fn close(&self) -> BackendResult<()>;

    /// Whether concurrent writes for different keys are allowed
    fn supports_parallel_saving(&self) -> bool {
        false
    }

    /// Whether concurrent reads for different keys are allowed
    fn supports_parallel_loading(&self) -> bool {
        false
    }
}
