//! Core types for worldstore
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: Error taxonomy (unregistered types, decode, backend I/O, instance composition)
//! - BinaryWriter / BinaryReader: Sequential binary codec primitives
//! - InstanceId: Unique identifier for world instances
//! - ChunkPos: Chunk coordinates
//! - DimensionType: Dimension of a world instance

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod error;
pub mod types;

pub use binary::{BinaryReader, BinaryWriter, DecodeResult};
pub use error::{BackendError, DecodeError, Error, Result};
pub use types::{ChunkPos, DimensionType, InstanceId};
