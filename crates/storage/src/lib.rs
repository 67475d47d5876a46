//! Typed, cached storage for world data
//!
//! This crate implements the storage layer:
//! - DataTypeRegistry: semantic value type -> encode/decode pair
//! - SerializableData: self-describing container of named typed values
//! - StorageBackend: pluggable raw byte store (MemoryBackend in-tree)
//! - StorageLocation: cached, typed façade over one backend
//! - StorageManager: one location per namespace, configured by `worldstore.toml`
//!
//! # Cache Coherency
//!
//! `StorageLocation::fetch_cached` performs check, load and insert in one
//! critical section. Concurrent callers for the same uncached key observe a
//! single backend load and share one container.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod data;
pub mod location;
pub mod manager;
pub mod registry;
pub mod testing;

pub use backend::{BackendResult, MemoryBackend, StorageBackend, StorageOptions};
pub use codec::{DataType, DecodeContext, ErasedDataType, MAX_NESTING_DEPTH};
pub use config::{StorageConfig, CONFIG_FILE_NAME};
pub use data::{DataContainer, DataValue, SerializableData, SharedData};
pub use location::StorageLocation;
pub use manager::{BackendFactory, StorageManager};
pub use registry::DataTypeRegistry;
