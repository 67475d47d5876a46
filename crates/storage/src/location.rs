//! Cached, typed storage location
//!
//! A [`StorageLocation`] wraps one opened [`StorageBackend`] and adds:
//!
//! - Raw passthroughs (`get_bytes`, `set_bytes`, `delete`, `close`)
//! - Typed access through the data type registry (`get_typed`, `set_typed`)
//! - A cache of [`SerializableData`] containers keyed by storage key
//!
//! # Cache Coherency
//!
//! Every cache entry holds either the state most recently loaded from the
//! backend or state a caller set since. The cache and the backend may diverge
//! until an explicit flush.
//!
//! `fetch_cached`, the flush operations and eviction all run under a single
//! mutex scoped to the cache map. Two threads asking for the same uncached key
//! therefore trigger exactly one backend load and share one container.
//! Raw passthroughs never take the cache lock.
//!
//! # Close Hazard
//!
//! `close` does not flush the cache. Callers must `flush_all` first or cached
//! changes are lost.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use worldstore_core::{Error, Result};

use crate::backend::{StorageBackend, StorageOptions};
use crate::data::{DataContainer, DataValue, SerializableData, SharedData};
use crate::registry::DataTypeRegistry;

/// Cached, typed façade over one storage backend
pub struct StorageLocation {
    backend: Box<dyn StorageBackend>,
    /// Backend-specific namespace (folder path, table name, ...)
    path: String,
    registry: Arc<DataTypeRegistry>,
    cache: Mutex<FxHashMap<String, SharedData>>,
}

impl StorageLocation {
    /// Open `backend` for `path` and bind a new location to it
    ///
    /// # Errors
    ///
    /// Returns `StorageIo` if the backend cannot be opened.
    pub fn open(
        backend: Box<dyn StorageBackend>,
        path: impl Into<String>,
        options: &StorageOptions,
        registry: Arc<DataTypeRegistry>,
    ) -> Result<Self> {
        let path = path.into();
        backend
            .open(&path, options)
            .map_err(|e| Error::storage_io("open", None, e))?;
        info!(namespace = %path, compression = options.compression, "Opened storage location");

        Ok(StorageLocation {
            backend,
            path,
            registry,
            cache: Mutex::new(FxHashMap::default()),
        })
    }

    /// Namespace this location was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Registry used for typed access
    pub fn registry(&self) -> &Arc<DataTypeRegistry> {
        &self.registry
    }

    /// Whether the backend allows concurrent reads
    pub fn supports_parallel_loading(&self) -> bool {
        self.backend.supports_parallel_loading()
    }

    /// Whether the backend allows concurrent writes
    pub fn supports_parallel_saving(&self) -> bool {
        self.backend.supports_parallel_saving()
    }

    // ========================================================================
    // Raw passthroughs
    // ========================================================================

    /// Get the raw bytes stored under `key`
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.backend
            .get(key)
            .map_err(|e| Error::storage_io("get", Some(key), e))
    }

    /// Store raw bytes under `key`
    pub fn set_bytes(&self, key: &str, data: &[u8]) -> Result<()> {
        self.backend
            .set(key, data)
            .map_err(|e| Error::storage_io("set", Some(key), e))
    }

    /// Delete `key` from the backend
    ///
    /// A cached container for `key` is left untouched.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.backend
            .delete(key)
            .map_err(|e| Error::storage_io("delete", Some(key), e))
    }

    /// Close the backend
    ///
    /// Does NOT flush cached containers.
    pub fn close(&self) -> Result<()> {
        let unflushed = self.cache.lock().len();
        if unflushed > 0 {
            warn!(
                namespace = %self.path,
                cached = unflushed,
                "Closing storage location with cached data that is not flushed automatically"
            );
        }
        self.backend
            .close()
            .map_err(|e| Error::storage_io("close", None, e))?;
        info!(namespace = %self.path, "Closed storage location");
        Ok(())
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    /// Get a typed value
    ///
    /// Returns `Ok(None)` when the key has no stored bytes. Fails with
    /// `UnregisteredType` when `T` has no data type, and with `Decode` when
    /// the stored bytes are corrupt.
    pub fn get_typed<T: DataValue>(&self, key: &str) -> Result<Option<T>> {
        // Resolve the codec first so an unregistered type fails even for absent keys
        self.registry.lookup_type::<T>()?;
        match self.get_bytes(key)? {
            None => Ok(None),
            Some(bytes) => self
                .registry
                .decode::<T>(&bytes)
                .map(Some)
                .map_err(|e| e.with_key(key)),
        }
    }

    /// Encode `value` with its registered data type and store it
    pub fn set_typed<T: DataValue>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = self.registry.encode(value)?;
        self.set_bytes(key, &bytes)
    }

    /// Get a typed value, falling back to `default` only when the key is absent
    ///
    /// Corrupt data is still an error.
    pub fn get_or_default<T: DataValue>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get_typed(key)?.unwrap_or(default))
    }

    // ========================================================================
    // Container cache
    // ========================================================================

    /// Load a container from the backend, or an empty one if the key is absent
    fn load(&self, key: &str) -> Result<SerializableData> {
        match self.get_bytes(key)? {
            Some(bytes) => SerializableData::decode_indexed(&bytes, &self.registry)
                .map_err(|e| e.with_key(key)),
            None => Ok(SerializableData::new(Arc::clone(&self.registry))),
        }
    }

    /// Get an independent copy of the container for `key`
    ///
    /// A cached container is deep-copied. Otherwise the container is loaded
    /// from the backend (or created empty) and returned without being cached.
    pub fn fetch_cloned(&self, key: &str) -> Result<SerializableData> {
        {
            let cache = self.cache.lock();
            if let Some(shared) = cache.get(key) {
                return Ok(shared.read().clone());
            }
        }
        self.load(key)
    }

    /// Get the shared container for `key`, loading and caching it if needed
    ///
    /// Check, load and insert happen in one critical section: concurrent
    /// callers for the same uncached key cause a single backend load and all
    /// receive the same container. A failed load leaves the cache unchanged.
    pub fn fetch_cached(&self, key: &str) -> Result<SharedData> {
        let mut cache = self.cache.lock();
        if let Some(shared) = cache.get(key) {
            return Ok(Arc::clone(shared));
        }

        let shared = self.load(key)?.into_shared();
        cache.insert(key.to_string(), Arc::clone(&shared));
        debug!(namespace = %self.path, key = %key, "Cached container");
        Ok(shared)
    }

    /// Hand an independent copy of `key`'s container to `container`
    pub fn get_and_clone_data(&self, key: &str, container: &dyn DataContainer) -> Result<()> {
        let data = self.fetch_cloned(key)?;
        container.set_data(data.into_shared());
        Ok(())
    }

    /// Hand the shared cached container for `key` to `container`
    pub fn get_and_cache_data(&self, key: &str, container: &dyn DataContainer) -> Result<()> {
        let data = self.fetch_cached(key)?;
        container.set_data(data);
        Ok(())
    }

    fn write_cached(&self, key: &str, shared: &SharedData) -> Result<()> {
        let bytes = shared.read().encode_indexed()?;
        self.set_bytes(key, &bytes)
    }

    /// Write the cached container for `key` to the backend
    ///
    /// No-op when `key` is not cached.
    pub fn flush_one(&self, key: &str) -> Result<()> {
        let cache = self.cache.lock();
        match cache.get(key) {
            Some(shared) => {
                self.write_cached(key, shared)?;
                debug!(namespace = %self.path, key = %key, "Flushed cached container");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Write the cached container for `key` to the backend, then evict it
    ///
    /// A failed write leaves the entry cached. After eviction the next
    /// `fetch_cached` reloads from the backend.
    pub fn flush_one_and_evict(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.lock();
        let Some(shared) = cache.get(key) else {
            return Ok(());
        };
        self.write_cached(key, shared)?;
        cache.remove(key);
        debug!(namespace = %self.path, key = %key, "Flushed and evicted cached container");
        Ok(())
    }

    /// Write every cached container to the backend
    ///
    /// The cache stays populated. Every entry is attempted even if one fails;
    /// the first failure is returned.
    pub fn flush_all(&self) -> Result<()> {
        let cache = self.cache.lock();
        let mut first_error = None;
        for (key, shared) in cache.iter() {
            if let Err(e) = self.write_cached(key, shared) {
                warn!(namespace = %self.path, key = %key, error = %e, "Failed to flush cached container");
                first_error.get_or_insert(e);
            }
        }
        debug!(namespace = %self.path, count = cache.len(), "Flushed cache");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether a container for `key` is cached
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.lock().contains_key(key)
    }

    /// Keys of every cached container, sorted
    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cache.lock().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of cached containers
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}

impl std::fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageLocation")
            .field("path", &self.path)
            .field("cached", &self.cache_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::testing::{CountingBackend, FailingBackend};
    use parking_lot::RwLock;
    use worldstore_core::DecodeError;

    fn registry() -> Arc<DataTypeRegistry> {
        Arc::new(DataTypeRegistry::with_defaults())
    }

    fn open_memory() -> (StorageLocation, MemoryBackend) {
        let backend = MemoryBackend::new();
        let location = StorageLocation::open(
            Box::new(backend.clone()),
            "world",
            &StorageOptions::default(),
            registry(),
        )
        .unwrap();
        (location, backend)
    }

    #[derive(Default)]
    struct Holder {
        data: RwLock<Option<SharedData>>,
    }

    impl DataContainer for Holder {
        fn set_data(&self, data: SharedData) {
            *self.data.write() = Some(data);
        }

        fn data(&self) -> Option<SharedData> {
            self.data.read().clone()
        }
    }

    #[test]
    fn test_open_passes_namespace_and_options() {
        let backend = MemoryBackend::new();
        let location = StorageLocation::open(
            Box::new(backend.clone()),
            "worlds/lobby",
            &StorageOptions::default().with_compression(true),
            registry(),
        )
        .unwrap();
        assert_eq!(location.path(), "worlds/lobby");
        assert_eq!(backend.namespace().as_deref(), Some("worlds/lobby"));
        assert!(backend.options().compression);
    }

    #[test]
    fn test_raw_passthrough() {
        let (location, backend) = open_memory();
        location.set_bytes("k", b"raw").unwrap();
        assert_eq!(location.get_bytes("k").unwrap(), Some(b"raw".to_vec()));
        assert_eq!(backend.raw("world", "k"), Some(b"raw".to_vec()));
        location.delete("k").unwrap();
        assert_eq!(location.get_bytes("k").unwrap(), None);
        assert_eq!(location.cache_len(), 0);
    }

    #[test]
    fn test_typed_roundtrip() {
        let (location, _) = open_memory();
        location.set_typed("score", &42i32).unwrap();
        assert_eq!(location.get_typed::<i32>("score").unwrap(), Some(42));
        assert_eq!(location.get_typed::<i32>("absent").unwrap(), None);
    }

    #[test]
    fn test_typed_unregistered() {
        let (location, _) = open_memory();
        assert!(matches!(
            location.set_typed("k", &1u128),
            Err(Error::UnregisteredType { .. })
        ));
        assert!(matches!(
            location.get_typed::<u128>("k"),
            Err(Error::UnregisteredType { .. })
        ));
    }

    #[test]
    fn test_get_or_default_only_covers_absence() {
        let (location, _) = open_memory();
        assert_eq!(location.get_or_default("score", 7i32).unwrap(), 7);

        location.set_bytes("score", &[1, 2]).unwrap();
        let err = location.get_or_default("score", 7i32).unwrap_err();
        match err {
            Error::Decode { key, source } => {
                assert_eq!(key.as_deref(), Some("score"));
                assert!(matches!(source, DecodeError::Truncated { .. }));
            }
            other => panic!("Wrong error variant: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_cached_returns_same_instance() {
        let (location, _) = open_memory();
        let a = location.fetch_cached("player:alice").unwrap();
        let b = location.fetch_cached("player:alice").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        a.write().set("level", 3i32).unwrap();
        assert_eq!(b.read().get::<i32>("level").unwrap(), Some(&3));
    }

    #[test]
    fn test_fetch_cloned_uncached_does_not_populate_cache() {
        let (location, _) = open_memory();
        let data = location.fetch_cloned("player:bob").unwrap();
        assert!(data.is_empty());
        assert!(!location.is_cached("player:bob"));
    }

    #[test]
    fn test_fetch_cloned_is_independent_of_cache() {
        let (location, _) = open_memory();
        let shared = location.fetch_cached("k").unwrap();
        shared.write().set("hp", 20i32).unwrap();

        let mut first = location.fetch_cloned("k").unwrap();
        let second = location.fetch_cloned("k").unwrap();
        first.set("hp", 1i32).unwrap();

        assert_eq!(second.get::<i32>("hp").unwrap(), Some(&20));
        assert_eq!(shared.read().get::<i32>("hp").unwrap(), Some(&20));
    }

    #[test]
    fn test_fetch_loads_existing_bytes() {
        let (location, _) = open_memory();
        let mut data = SerializableData::new(registry());
        data.set("name", "alice".to_string()).unwrap();
        location
            .set_bytes("player:alice", &data.encode_indexed().unwrap())
            .unwrap();

        assert_eq!(location.fetch_cloned("player:alice").unwrap(), data);
        assert_eq!(*location.fetch_cached("player:alice").unwrap().read(), data);
    }

    #[test]
    fn test_fetch_corrupt_data_is_error_and_not_cached() {
        let (location, _) = open_memory();
        location.set_bytes("bad", &[5, 1]).unwrap();

        let err = location.fetch_cached("bad").unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("bad"));
        assert!(!location.is_cached("bad"));

        assert!(location.fetch_cloned("bad").unwrap_err().is_decode());
    }

    #[test]
    fn test_flush_one() {
        let (location, backend) = open_memory();
        let shared = location.fetch_cached("k").unwrap();
        shared.write().set("score", 9i32).unwrap();
        assert_eq!(backend.raw("world", "k"), None);

        location.flush_one("k").unwrap();
        let stored = backend.raw("world", "k").unwrap();
        let decoded = SerializableData::decode_indexed(&stored, location.registry()).unwrap();
        assert_eq!(decoded.get::<i32>("score").unwrap(), Some(&9));
        assert!(location.is_cached("k"));

        // Not cached: no-op
        location.flush_one("other").unwrap();
        assert_eq!(backend.raw("world", "other"), None);
    }

    #[test]
    fn test_flush_one_and_evict_reloads_fresh() {
        let (location, backend) = open_memory();
        let before = location.fetch_cached("k").unwrap();
        before.write().set("score", 1i32).unwrap();

        location.flush_one_and_evict("k").unwrap();
        assert!(!location.is_cached("k"));
        assert!(backend.raw("world", "k").is_some());

        let after = location.fetch_cached("k").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.read().get::<i32>("score").unwrap(), Some(&1));

        // Mutating the stale handle no longer reaches the cache
        before.write().set("score", 100i32).unwrap();
        assert_eq!(after.read().get::<i32>("score").unwrap(), Some(&1));
    }

    #[test]
    fn test_flush_all_keeps_cache() {
        let (location, backend) = open_memory();
        for key in ["a", "b", "c"] {
            location
                .fetch_cached(key)
                .unwrap()
                .write()
                .set("key", key.to_string())
                .unwrap();
        }
        location.flush_all().unwrap();
        assert_eq!(location.cached_keys(), vec!["a", "b", "c"]);
        assert_eq!(backend.key_count("world"), 3);
    }

    #[test]
    fn test_failed_flush_does_not_evict() {
        let backend = FailingBackend::new(MemoryBackend::new());
        let switch = backend.clone();
        let location =
            StorageLocation::open(Box::new(backend), "world", &StorageOptions::default(), registry())
                .unwrap();

        location.fetch_cached("k").unwrap().write().set("x", 1i32).unwrap();
        switch.fail_writes(true);

        let err = location.flush_one_and_evict("k").unwrap_err();
        assert!(matches!(err, Error::StorageIo { operation: "set", .. }));
        assert!(location.is_cached("k"));
        assert!(location.flush_all().is_err());
        assert!(location.is_cached("k"));

        switch.fail_writes(false);
        location.flush_one_and_evict("k").unwrap();
        assert!(!location.is_cached("k"));
    }

    #[test]
    fn test_failed_load_leaves_cache_unchanged() {
        let backend = FailingBackend::new(MemoryBackend::new());
        let switch = backend.clone();
        let location =
            StorageLocation::open(Box::new(backend), "world", &StorageOptions::default(), registry())
                .unwrap();

        switch.fail_reads(true);
        let err = location.fetch_cached("k").unwrap_err();
        assert!(matches!(err, Error::StorageIo { operation: "get", .. }));
        assert_eq!(location.cache_len(), 0);
    }

    #[test]
    fn test_fetch_cached_loads_once() {
        let backend = CountingBackend::new(MemoryBackend::new());
        let counter = backend.clone();
        let location =
            StorageLocation::open(Box::new(backend), "world", &StorageOptions::default(), registry())
                .unwrap();

        for _ in 0..5 {
            location.fetch_cached("k").unwrap();
        }
        assert_eq!(counter.gets(), 1);
    }

    #[test]
    fn test_data_container_collaborator() {
        let (location, _) = open_memory();
        let cached = Holder::default();
        let cloned = Holder::default();

        location.get_and_cache_data("k", &cached).unwrap();
        location.get_and_clone_data("k", &cloned).unwrap();

        let shared = location.fetch_cached("k").unwrap();
        assert!(Arc::ptr_eq(&cached.data().unwrap(), &shared));
        assert!(!Arc::ptr_eq(&cloned.data().unwrap(), &shared));
    }

    #[test]
    fn test_close_does_not_flush() {
        let (location, backend) = open_memory();
        location.fetch_cached("k").unwrap().write().set("x", 1i32).unwrap();
        location.close().unwrap();
        assert!(backend.is_closed());
        assert_eq!(backend.raw("world", "k"), None);
        assert!(matches!(
            location.get_bytes("k"),
            Err(Error::StorageIo { operation: "get", .. })
        ));
    }

    #[test]
    fn test_location_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageLocation>();
    }
}
