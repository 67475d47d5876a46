//! Chunk model
//!
//! A chunk is a 16 x 256 x 16 column of block ids addressed by local
//! coordinates. Blocks may carry an optional [`SerializableData`] container.
//!
//! Block index layout: `(y << 8) | (z << 4) | x`, which covers exactly the
//! `u16` range.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use worldstore_core::ChunkPos;
use worldstore_storage::SerializableData;

/// Chunk width along X
pub const CHUNK_SIZE_X: usize = 16;
/// Chunk height
pub const CHUNK_SIZE_Y: usize = 256;
/// Chunk width along Z
pub const CHUNK_SIZE_Z: usize = 16;
/// Number of blocks in one chunk
pub const BLOCKS_PER_CHUNK: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;

/// Block id of air, the value of every block in a new chunk
pub const AIR: u16 = 0;

/// A chunk shared between the instance that loaded it and its callers
pub type SharedChunk = Arc<RwLock<Chunk>>;

/// One chunk column of block ids plus per-block data
#[derive(Clone, PartialEq)]
pub struct Chunk {
    pos: ChunkPos,
    blocks: Box<[u16]>,
    block_data: BTreeMap<u16, SerializableData>,
    /// Changed since last load or save
    dirty: bool,
}

impl Chunk {
    /// All-air chunk at `pos`, marked dirty since it was never persisted
    pub fn new(pos: ChunkPos) -> Self {
        Chunk {
            pos,
            blocks: vec![AIR; BLOCKS_PER_CHUNK].into_boxed_slice(),
            block_data: BTreeMap::new(),
            dirty: true,
        }
    }

    /// Index of local coordinates, None when out of range
    pub fn index(x: usize, y: usize, z: usize) -> Option<u16> {
        if x < CHUNK_SIZE_X && y < CHUNK_SIZE_Y && z < CHUNK_SIZE_Z {
            Some(((y << 8) | (z << 4) | x) as u16)
        } else {
            None
        }
    }

    /// Chunk position
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Block id at local coordinates, None when out of range
    pub fn get_block(&self, x: usize, y: usize, z: usize) -> Option<u16> {
        Self::index(x, y, z).map(|index| self.blocks[index as usize])
    }

    /// Set the block at local coordinates
    ///
    /// Replacing a block drops its block data. Returns false when the
    /// coordinates are out of range.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, id: u16) -> bool {
        match Self::index(x, y, z) {
            Some(index) => {
                self.set_block_at(index, id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_block_at(&mut self, index: u16, id: u16) {
        self.blocks[index as usize] = id;
        self.block_data.remove(&index);
        self.dirty = true;
    }

    /// Block data at local coordinates
    pub fn block_data(&self, x: usize, y: usize, z: usize) -> Option<&SerializableData> {
        Self::index(x, y, z).and_then(|index| self.block_data.get(&index))
    }

    /// Mutable block data at local coordinates; marks the chunk dirty
    pub fn block_data_mut(&mut self, x: usize, y: usize, z: usize) -> Option<&mut SerializableData> {
        let index = Self::index(x, y, z)?;
        let data = self.block_data.get_mut(&index)?;
        self.dirty = true;
        Some(data)
    }

    /// Attach data to a block, or remove it with `None`
    ///
    /// Returns false when the coordinates are out of range.
    pub fn set_block_data(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        data: Option<SerializableData>,
    ) -> bool {
        match Self::index(x, y, z) {
            Some(index) => {
                self.set_block_data_at(index, data);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_block_data_at(&mut self, index: u16, data: Option<SerializableData>) {
        match data {
            Some(data) => self.block_data.insert(index, data),
            None => self.block_data.remove(&index),
        };
        self.dirty = true;
    }

    /// Non-air blocks as `(index, id)` pairs in index order
    pub fn non_air_blocks(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, id)| **id != AIR)
            .map(|(index, id)| (index as u16, *id))
    }

    /// Number of non-air blocks
    pub fn non_air_count(&self) -> usize {
        self.blocks.iter().filter(|id| **id != AIR).count()
    }

    /// Block data entries as `(index, data)` pairs in index order
    pub fn block_data_entries(&self) -> impl Iterator<Item = (u16, &SerializableData)> + '_ {
        self.block_data.iter().map(|(index, data)| (*index, data))
    }

    /// Number of blocks carrying data
    pub fn block_data_count(&self) -> usize {
        self.block_data.len()
    }

    /// Whether the chunk changed since it was last loaded or saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the chunk as matching persisted state
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Wrap into a [`SharedChunk`]
    pub fn into_shared(self) -> SharedChunk {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("non_air", &self.non_air_count())
            .field("block_data", &self.block_data.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
