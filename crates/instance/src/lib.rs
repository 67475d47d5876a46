//! World instances and chunk persistence
//!
//! This crate implements:
//! - Chunk: 16 x 256 x 16 block column with per-block data
//! - ChunkLoader: pluggable chunk persistence contract
//! - StorageChunkLoader: chunk loader over a storage location
//! - InstanceContainer / SharedInstance: world instances
//! - InstanceManager: registry enforcing instance composition
//!
//! # Composition
//!
//! A shared instance delegates every persisted read to one container. The
//! registry only lets a shared instance in once its container is set, and
//! only creates shared instances for registered containers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod instance;
pub mod loader;
pub mod manager;
pub mod storage_loader;

pub use chunk::{Chunk, SharedChunk, AIR, BLOCKS_PER_CHUNK, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z};
pub use instance::{Instance, InstanceContainer, SharedInstance};
pub use loader::{ChunkCallback, ChunkLoadStatus, ChunkLoader, NullChunkLoader, SaveCallback};
pub use manager::InstanceManager;
pub use storage_loader::{decode_chunk, encode_chunk, StorageChunkLoader};
