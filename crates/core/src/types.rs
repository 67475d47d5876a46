//! Core identifier types for worldstore
//!
//! This module defines the foundational types:
//! - InstanceId: Process-unique identifier for world instances
//! - ChunkPos: Integer chunk coordinates within an instance
//! - DimensionType: The dimension a world instance simulates

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a world instance
///
/// An InstanceId is a wrapper around a UUID v4. Identifiers are assigned
/// when an instance is constructed and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Create a new random InstanceId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an InstanceId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse an InstanceId from its string representation
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coordinates of a chunk column within an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk X coordinate
    pub x: i32,
    /// Chunk Z coordinate
    pub z: i32,
}

impl ChunkPos {
    /// Create a chunk position
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Storage key for this chunk: `chunk_{x}.{z}`
    pub fn storage_key(&self) -> String {
        format!("chunk_{}.{}", self.x, self.z)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Dimension simulated by a world instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    /// Default surface world
    #[default]
    Overworld,
    /// Underworld
    Nether,
    /// End dimension
    End,
}

impl DimensionType {
    /// Stable name used in logs and configuration
    pub fn name(&self) -> &'static str {
        match self {
            DimensionType::Overworld => "overworld",
            DimensionType::Nether => "nether",
            DimensionType::End => "end",
        }
    }

    /// Whether the dimension has a sky light channel
    pub fn has_sky_light(&self) -> bool {
        matches!(self, DimensionType::Overworld)
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_unique() {
        let a = InstanceId::new();
        let b = InstanceId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_instance_id_string_roundtrip() {
        let id = InstanceId::new();
        let parsed = InstanceId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(InstanceId::from_string("not-a-uuid").is_none());
    }

    #[test]
    fn test_chunk_pos_storage_key() {
        assert_eq!(ChunkPos::new(3, -7).storage_key(), "chunk_3.-7");
        assert_eq!(ChunkPos::new(0, 0).to_string(), "(0, 0)");
    }

    #[test]
    fn test_dimension_defaults_to_overworld() {
        assert_eq!(DimensionType::default(), DimensionType::Overworld);
        assert!(DimensionType::Overworld.has_sky_light());
        assert!(!DimensionType::Nether.has_sky_light());
        assert_eq!(DimensionType::End.to_string(), "end");
    }
}
