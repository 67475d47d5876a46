//! Backend test doubles
//!
//! - **CountingBackend**: counts `get`/`set` calls, optionally slowing reads
//!   so races on an uncached key are easy to provoke
//! - **FailingBackend**: injects I/O failures on demand
//!
//! Both wrap another backend and are cheap to clone. Clones share counters
//! and switches, so a test keeps one clone and hands the other to a location.
//!
//! # Example
//!
//! ```ignore
//! use worldstore_storage::testing::CountingBackend;
//!
//! let backend = CountingBackend::new(MemoryBackend::new());
//! let counter = backend.clone();
//! let location = StorageLocation::open(Box::new(backend), "world", &options, registry)?;
//! location.fetch_cached("k")?;
//! assert_eq!(counter.gets(), 1);
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use worldstore_core::BackendError;

use crate::backend::{BackendResult, StorageBackend, StorageOptions};

/// Backend wrapper counting reads and writes
#[derive(Clone)]
pub struct CountingBackend {
    inner: Arc<dyn StorageBackend>,
    gets: Arc<AtomicUsize>,
    sets: Arc<AtomicUsize>,
    get_delay: Option<Duration>,
}

impl CountingBackend {
    /// Wrap `inner`
    pub fn new(inner: impl StorageBackend + 'static) -> Self {
        CountingBackend {
            inner: Arc::new(inner),
            gets: Arc::new(AtomicUsize::new(0)),
            sets: Arc::new(AtomicUsize::new(0)),
            get_delay: None,
        }
    }

    /// Sleep for `delay` inside every `get`
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    /// Number of `get` calls so far
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls so far
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl StorageBackend for CountingBackend {
    fn open(&self, namespace: &str, options: &StorageOptions) -> BackendResult<()> {
        self.inner.open(namespace, options)
    }

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.get_delay {
            std::thread::sleep(delay);
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, data: &[u8]) -> BackendResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, data)
    }

    fn delete(&self, key: &str) -> BackendResult<()> {
        self.inner.delete(key)
    }

    fn close(&self) -> BackendResult<()> {
        self.inner.close()
    }

    fn supports_parallel_saving(&self) -> bool {
        self.inner.supports_parallel_saving()
    }

    fn supports_parallel_loading(&self) -> bool {
        self.inner.supports_parallel_loading()
    }
}

/// Backend wrapper that fails reads or writes while a switch is on
#[derive(Clone)]
pub struct FailingBackend {
    inner: Arc<dyn StorageBackend>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl FailingBackend {
    /// Wrap `inner`; nothing fails until a switch is turned on
    pub fn new(inner: impl StorageBackend + 'static) -> Self {
        FailingBackend {
            inner: Arc::new(inner),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make `get` fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `set` and `delete` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected(operation: &str) -> BackendError {
        BackendError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("injected {} failure", operation),
        ))
    }
}

impl StorageBackend for FailingBackend {
    fn open(&self, namespace: &str, options: &StorageOptions) -> BackendResult<()> {
        self.inner.open(namespace, options)
    }

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("read"));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, data: &[u8]) -> BackendResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.inner.set(key, data)
    }

    fn delete(&self, key: &str) -> BackendResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(key)
    }

    fn close(&self) -> BackendResult<()> {
        self.inner.close()
    }

    fn supports_parallel_saving(&self) -> bool {
        self.inner.supports_parallel_saving()
    }

    fn supports_parallel_loading(&self) -> bool {
        self.inner.supports_parallel_loading()
    }
}
