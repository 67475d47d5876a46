//! Chunk loader contract
//!
//! A [`ChunkLoader`] persists chunk content for an instance. Loading returns
//! two independent signals:
//!
//! - an immediate [`ChunkLoadStatus`] saying whether the loader serviced the
//!   request (the chunk exists in this backend)
//! - a completion callback carrying the populated chunk
//!
//! The two are not ordered relative to each other: a loader may invoke the
//! callback before returning, or later from another thread.
//!
//! # Parallel I/O
//!
//! `supports_parallel_loading` / `supports_parallel_saving` default to false.
//! A caller must not issue concurrent loads (or saves) for two different
//! chunks against a loader reporting false. The loader does not enforce this.

use tracing::debug;
use worldstore_core::{ChunkPos, Result};

use crate::chunk::Chunk;
use crate::instance::InstanceContainer;

/// Completion of a chunk load
pub type ChunkCallback = Box<dyn FnOnce(Result<Chunk>) + Send>;

/// Completion of a chunk save
pub type SaveCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// Immediate answer to a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLoadStatus {
    /// The loader serviced the request; the callback receives the outcome
    Accepted,
    /// Nothing is stored for the chunk; the callback is dropped uninvoked
    Absent,
}

impl ChunkLoadStatus {
    /// Whether the request was serviced
    pub fn is_accepted(&self) -> bool {
        matches!(self, ChunkLoadStatus::Accepted)
    }
}

/// Pluggable chunk persistence strategy
pub trait ChunkLoader: Send + Sync {
    /// Start loading the chunk at `pos` for `instance`
    ///
    /// The delivered chunk has every block set; no generation is applied.
    fn load_chunk(
        &self,
        instance: &InstanceContainer,
        pos: ChunkPos,
        callback: ChunkCallback,
    ) -> ChunkLoadStatus;

    /// Persist `chunk`, signalling completion through `callback`
    fn save_chunk(&self, chunk: &Chunk, callback: SaveCallback);

    /// Whether concurrent saves of different chunks are allowed
    fn supports_parallel_saving(&self) -> bool {
        false
    }

    /// Whether concurrent loads of different chunks are allowed
    fn supports_parallel_loading(&self) -> bool {
        false
    }
}

/// Loader for instances without storage
///
/// Every chunk is absent and saves complete immediately without persisting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChunkLoader;

impl ChunkLoader for NullChunkLoader {
    fn load_chunk(
        &self,
        instance: &InstanceContainer,
        pos: ChunkPos,
        _callback: ChunkCallback,
    ) -> ChunkLoadStatus {
        debug!(instance = %instance.id(), chunk = %pos, "No storage, chunk absent");
        ChunkLoadStatus::Absent
    }

    fn save_chunk(&self, _chunk: &Chunk, callback: SaveCallback) {
        callback(Ok(()));
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
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use worldstore_core::{DimensionType, InstanceId};

    // Test that trait is object-safe
    fn _accepts_dyn_loader(_loader: Arc<dyn ChunkLoader>) {}

    #[test]
    fn test_status_is_accepted() {
        assert!(ChunkLoadStatus::Accepted.is_accepted());
        assert!(!ChunkLoadStatus::Absent.is_accepted());
    }

    #[test]
    fn test_null_loader_drops_load_callback() {
        let container = InstanceContainer::new(InstanceId::new(), DimensionType::Overworld, None);
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);

        let status = NullChunkLoader.load_chunk(
            &container,
            ChunkPos::new(0, 0),
            Box::new(move |_| flag.store(true, Ordering::SeqCst)),
        );

        assert_eq!(status, ChunkLoadStatus::Absent);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_null_loader_save_completes() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        NullChunkLoader.save_chunk(
            &Chunk::new(ChunkPos::new(0, 0)),
            Box::new(move |result| {
                assert!(result.is_ok());
                flag.store(true, Ordering::SeqCst);
            }),
        );
        assert!(called.load(Ordering::SeqCst));
    }
}
