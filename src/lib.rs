//! Worldstore - typed, cached world storage for multiplayer game servers
//!
//! Worldstore is the persistence and registration backbone of a world
//! server: a pluggable storage layer with a per-location container cache, a
//! chunk persistence contract, and a registry of world instances.
//!
//! # Quick Start
//!
//! ```ignore
//! use worldstore::{InstanceManager, StorageManager, DimensionType};
//!
//! let storage = StorageManager::in_memory();
//! let instances = InstanceManager::new();
//!
//! let lobby = instances.create_container(DimensionType::Overworld, Some(storage.location("lobby")?));
//! let spectators = instances.create_shared(&lobby)?;
//!
//! let location = lobby.storage_location().unwrap();
//! location.set_typed("score", &42i32)?;
//! let player = location.fetch_cached("player:alice")?;
//! player.write().set("level", 3i32)?;
//! location.flush_all()?;
//! ```
//!
//! # Architecture
//!
//! - `worldstore-core`: errors, binary codec primitives, identifiers
//! - `worldstore-storage`: data types, containers, backends, storage locations
//! - `worldstore-instance`: chunks, chunk loaders, instances, instance registry

pub use worldstore_core::{
    BackendError, BinaryReader, BinaryWriter, ChunkPos, DecodeError, DecodeResult, DimensionType,
    Error, InstanceId, Result,
};
pub use worldstore_instance::{
    decode_chunk, encode_chunk, Chunk, ChunkCallback, ChunkLoadStatus, ChunkLoader, Instance,
    InstanceContainer, InstanceManager, NullChunkLoader, SaveCallback, SharedChunk,
    SharedInstance, StorageChunkLoader, AIR, BLOCKS_PER_CHUNK, CHUNK_SIZE_X, CHUNK_SIZE_Y,
    CHUNK_SIZE_Z,
};
pub use worldstore_storage::{
    BackendFactory, BackendResult, DataContainer, DataType, DataTypeRegistry, DataValue,
    DecodeContext, ErasedDataType, MemoryBackend, SerializableData, SharedData, StorageBackend,
    StorageConfig, StorageLocation, StorageManager, StorageOptions, CONFIG_FILE_NAME,
    MAX_NESTING_DEPTH,
};

/// Built-in data types
pub use worldstore_storage::codec;
/// Backend test doubles
pub use worldstore_storage::testing;
