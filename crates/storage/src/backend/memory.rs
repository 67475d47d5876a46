//! In-memory backend.
//!
//! Holds every namespace's bytes in a hash map. Clones share the same store
//! and session, so data written through one handle survives a close/reopen
//! cycle and is visible to every other clone, the way files on disk would be.
//! `handle()` shares the store but starts a fresh session, which lets several
//! locations open different namespaces of one store.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use worldstore_core::BackendError;

use super::{BackendResult, StorageBackend, StorageOptions};

/// namespace -> key -> bytes
type Store = FxHashMap<String, FxHashMap<String, Vec<u8>>>;

#[derive(Debug, Default)]
struct Session {
    /// Namespace currently open, None before `open`
    namespace: Option<String>,
    closed: bool,
    options: StorageOptions,
}

impl Session {
    fn open_namespace(&self) -> BackendResult<&str> {
        match (&self.namespace, self.closed) {
            (Some(ns), false) => Ok(ns),
            (_, true) => Err(BackendError::Closed),
            (None, false) => Err(BackendError::NotOpen),
        }
    }
}

/// Hash-map backed store
///
/// Supports parallel loading and saving.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<RwLock<Store>>,
    session: Arc<RwLock<Session>>,
}

impl MemoryBackend {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// New unopened handle onto the same store
    pub fn handle(&self) -> Self {
        MemoryBackend {
            store: Arc::clone(&self.store),
            session: Arc::new(RwLock::new(Session::default())),
        }
    }

    /// Namespace currently open
    pub fn namespace(&self) -> Option<String> {
        let session = self.session.read();
        if session.closed {
            None
        } else {
            session.namespace.clone()
        }
    }

    /// Options passed to the last `open`
    pub fn options(&self) -> StorageOptions {
        self.session.read().options.clone()
    }

    /// Whether `close` has been called since the last `open`
    pub fn is_closed(&self) -> bool {
        self.session.read().closed
    }

    /// Bytes stored under `key` in `namespace`, bypassing open/closed checks
    pub fn raw(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.store
            .read()
            .get(namespace)
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Number of keys stored in `namespace`
    pub fn key_count(&self, namespace: &str) -> usize {
        self.store
            .read()
            .get(namespace)
            .map_or(0, |entries| entries.len())
    }

    /// Every namespace that has been opened, sorted
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.store.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn current_namespace(&self) -> BackendResult<String> {
        self.session.read().open_namespace().map(str::to_string)
    }
}

impl StorageBackend for MemoryBackend {
    fn open(&self, namespace: &str, options: &StorageOptions) -> BackendResult<()> {
        let mut session = self.session.write();
        session.namespace = Some(namespace.to_string());
        session.closed = false;
        session.options = options.clone();
        self.store.write().entry(namespace.to_string()).or_default();
        Ok(())
    }

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let namespace = self.current_namespace()?;
        Ok(self
            .store
            .read()
            .get(&namespace)
            .and_then(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &str, data: &[u8]) -> BackendResult<()> {
        let namespace = self.current_namespace()?;
        self.store
            .write()
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> BackendResult<()> {
        let namespace = self.current_namespace()?;
        if let Some(entries) = self.store.write().get_mut(&namespace) {
            entries.remove(key);
        }
        Ok(())
    }

    fn close(&self) -> BackendResult<()> {
        let mut session = self.session.write();
        session.open_namespace()?;
        session.closed = true;
        Ok(())
    }

    fn supports_parallel_saving(&self) -> bool {
        true
    }

    fn supports_parallel_loading(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_require_open() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.get("k"), Err(BackendError::NotOpen)));
        assert!(matches!(backend.set("k", b"v"), Err(BackendError::NotOpen)));
    }

    #[test]
    fn test_set_get_delete() {
        let backend = MemoryBackend::new();
        backend.open("world", &StorageOptions::default()).unwrap();

        assert_eq!(backend.get("k").unwrap(), None);
        backend.set("k", b"v").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"v".to_vec()));

        backend.delete("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
        // Deleting an absent key is fine
        backend.delete("k").unwrap();
    }

    #[test]
    fn test_closed_rejects_operations() {
        let backend = MemoryBackend::new();
        backend.open("world", &StorageOptions::default()).unwrap();
        backend.close().unwrap();

        assert!(backend.is_closed());
        assert!(matches!(backend.get("k"), Err(BackendError::Closed)));
        assert!(matches!(backend.close(), Err(BackendError::Closed)));
    }

    #[test]
    fn test_data_survives_reopen_and_is_shared_by_clones() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();

        backend.open("world", &StorageOptions::default()).unwrap();
        backend.set("k", b"v").unwrap();
        backend.close().unwrap();

        assert_eq!(observer.raw("world", "k"), Some(b"v".to_vec()));

        backend
            .open("world", &StorageOptions::default().with_compression(true))
            .unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"v".to_vec()));
        assert!(observer.options().compression);
    }

    #[test]
    fn test_handles_share_store_not_session() {
        let backend = MemoryBackend::new();
        let lobby = backend.handle();
        let arena = backend.handle();
        lobby.open("lobby", &StorageOptions::default()).unwrap();
        arena.open("arena", &StorageOptions::default()).unwrap();

        lobby.set("k", b"lobby").unwrap();
        arena.set("k", b"arena").unwrap();

        assert_eq!(lobby.get("k").unwrap(), Some(b"lobby".to_vec()));
        assert_eq!(backend.raw("arena", "k"), Some(b"arena".to_vec()));
        assert_eq!(backend.namespaces(), vec!["arena", "lobby"]);
        assert!(matches!(backend.get("k"), Err(BackendError::NotOpen)));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let backend = MemoryBackend::new();
        backend.open("a", &StorageOptions::default()).unwrap();
        backend.set("k", b"1").unwrap();
        backend.open("b", &StorageOptions::default()).unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
        assert_eq!(backend.key_count("a"), 1);
        assert_eq!(backend.key_count("b"), 0);
    }
}
