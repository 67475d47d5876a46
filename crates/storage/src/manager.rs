//! Storage manager
//!
//! Owns the storage configuration, the shared data type registry and a
//! backend factory. Hands out exactly one [`StorageLocation`] per namespace
//! path: the first request opens it, later requests reuse it.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use worldstore_core::Result;

use crate::backend::{MemoryBackend, StorageBackend};
use crate::config::StorageConfig;
use crate::location::StorageLocation;
use crate::registry::DataTypeRegistry;

/// Creates a fresh, unopened backend for each new location
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn StorageBackend> + Send + Sync>;

/// Registry of open storage locations
pub struct StorageManager {
    config: StorageConfig,
    registry: Arc<DataTypeRegistry>,
    factory: BackendFactory,
    /// Location path -> open location
    locations: Mutex<FxHashMap<String, Arc<StorageLocation>>>,
}

impl StorageManager {
    /// Create a manager that builds backends with `factory`
    pub fn new(
        config: StorageConfig,
        registry: Arc<DataTypeRegistry>,
        factory: BackendFactory,
    ) -> Self {
        StorageManager {
            config,
            registry,
            factory,
            locations: Mutex::new(FxHashMap::default()),
        }
    }

    /// Manager over one in-memory store with the default config and registry
    pub fn in_memory() -> Self {
        let store = MemoryBackend::new();
        Self::new(
            StorageConfig::default(),
            Arc::new(DataTypeRegistry::with_defaults()),
            Arc::new(move || Box::new(store.handle()) as Box<dyn StorageBackend>),
        )
    }

    /// Storage configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Data type registry shared by every location
    pub fn registry(&self) -> &Arc<DataTypeRegistry> {
        &self.registry
    }

    /// Get the location for `path`, opening it on first use
    ///
    /// The namespace handed to the backend is `path` resolved against the
    /// configured root. A failed open is not remembered.
    pub fn location(&self, path: &str) -> Result<Arc<StorageLocation>> {
        let mut locations = self.locations.lock();
        if let Some(location) = locations.get(path) {
            return Ok(Arc::clone(location));
        }

        let location = Arc::new(StorageLocation::open(
            (self.factory)(),
            self.config.namespace_for(path),
            &self.config.storage_options(),
            Arc::clone(&self.registry),
        )?);
        locations.insert(path.to_string(), Arc::clone(&location));
        debug!(path = %path, "Registered storage location");
        Ok(location)
    }

    /// Paths of every open location, sorted
    pub fn loaded_locations(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.locations.lock().keys().cloned().collect();
        paths.sort_unstable();
        paths
    }

    /// Close every open location and forget it
    ///
    /// With `flush_on_close` set, each location's cache is flushed before it
    /// is closed. Every location is attempted; the first error is returned.
    pub fn close_all(&self) -> Result<()> {
        let drained: Vec<(String, Arc<StorageLocation>)> =
            self.locations.lock().drain().collect();
        let count = drained.len();
        let mut first_error = None;

        for (path, location) in drained {
            if self.config.flush_on_close {
                if let Err(e) = location.flush_all() {
                    warn!(path = %path, error = %e, "Failed to flush location before close");
                    first_error.get_or_insert(e);
                }
            }
            if let Err(e) = location.close() {
                warn!(path = %path, error = %e, "Failed to close location");
                first_error.get_or_insert(e);
            }
        }

        info!(count, flushed = self.config.flush_on_close, "Closed storage locations");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("config", &self.config)
            .field("locations", &self.loaded_locations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingBackend;

    fn manager_with(
        config: StorageConfig,
        backend: MemoryBackend,
    ) -> StorageManager {
        StorageManager::new(
            config,
            Arc::new(DataTypeRegistry::with_defaults()),
            Arc::new(move || Box::new(backend.handle()) as Box<dyn StorageBackend>),
        )
    }

    #[test]
    fn test_location_is_reused() {
        let manager = StorageManager::in_memory();
        let a = manager.location("lobby").unwrap();
        let b = manager.location("lobby").unwrap();
        let c = manager.location("arena").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.loaded_locations(), vec!["arena", "lobby"]);
    }

    #[test]
    fn test_locations_are_isolated() {
        let manager = StorageManager::in_memory();
        let lobby = manager.location("lobby").unwrap();
        let arena = manager.location("arena").unwrap();
        lobby.set_typed("players", &3i32).unwrap();
        assert_eq!(arena.get_typed::<i32>("players").unwrap(), None);
        assert_eq!(lobby.get_typed::<i32>("players").unwrap(), Some(3));
    }

    #[test]
    fn test_location_namespace_uses_root() {
        let manager = StorageManager::in_memory();
        let location = manager.location("lobby").unwrap();
        assert_eq!(location.path(), manager.config().namespace_for("lobby"));
    }

    #[test]
    fn test_close_all_without_flush_discards_cache() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();
        let manager = manager_with(StorageConfig::default(), backend);

        let location = manager.location("lobby").unwrap();
        location.fetch_cached("k").unwrap().write().set("x", 1i32).unwrap();
        let namespace = location.path().to_string();

        manager.close_all().unwrap();
        assert!(manager.loaded_locations().is_empty());
        assert_eq!(observer.raw(&namespace, "k"), None);
    }

    #[test]
    fn test_close_all_with_flush_persists_cache() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();
        let config = StorageConfig {
            flush_on_close: true,
            ..StorageConfig::default()
        };
        let manager = manager_with(config, backend);

        let location = manager.location("lobby").unwrap();
        location.fetch_cached("k").unwrap().write().set("x", 1i32).unwrap();
        let namespace = location.path().to_string();

        manager.close_all().unwrap();
        assert!(observer.raw(&namespace, "k").is_some());
    }

    #[test]
    fn test_close_all_reports_flush_failure() {
        let failing = FailingBackend::new(MemoryBackend::new());
        let switch = failing.clone();
        let config = StorageConfig {
            flush_on_close: true,
            ..StorageConfig::default()
        };
        let manager = StorageManager::new(
            config,
            Arc::new(DataTypeRegistry::with_defaults()),
            Arc::new(move || Box::new(failing.clone()) as Box<dyn StorageBackend>),
        );

        let location = manager.location("lobby").unwrap();
        location.fetch_cached("k").unwrap();
        switch.fail_writes(true);

        assert!(manager.close_all().is_err());
        assert!(manager.loaded_locations().is_empty());
    }

    #[test]
    fn test_compression_forwarded_to_backend() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();
        let config = StorageConfig {
            compression: true,
            ..StorageConfig::default()
        };
        let manager = StorageManager::new(
            config,
            Arc::new(DataTypeRegistry::with_defaults()),
            Arc::new(move || Box::new(backend.clone()) as Box<dyn StorageBackend>),
        );
        manager.location("lobby").unwrap();
        assert!(observer.options().compression);
    }
}
