//! Chunk loader backed by a storage location
//!
//! Chunks are stored as raw bytes under `chunk_{x}.{z}`.
//!
//! ## Chunk Format
//!
//! ```text
//! [non_air_count: varint]
//! For each non-air block (ascending index):
//!   [index: u16] [block_id: u16]
//! [block_data_count: varint]
//! For each block carrying data (ascending index):
//!   [index: u16] [data: indexed container]
//! ```
//!
//! Completion callbacks run synchronously on the calling thread, before
//! `load_chunk` / `save_chunk` return.

use std::sync::Arc;

use tracing::debug;
use worldstore_core::{BinaryReader, BinaryWriter, ChunkPos, DecodeError, DecodeResult, Result};
use worldstore_storage::{DataTypeRegistry, DecodeContext, SerializableData, StorageLocation};

use crate::chunk::{Chunk, BLOCKS_PER_CHUNK};
use crate::instance::InstanceContainer;
use crate::loader::{ChunkCallback, ChunkLoadStatus, ChunkLoader, SaveCallback};

/// Encode a chunk into its stored form
pub fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::with_capacity(64 + chunk.non_air_count() * 4);

    writer.write_len(chunk.non_air_count())?;
    for (index, id) in chunk.non_air_blocks() {
        writer.write_u16(index);
        writer.write_u16(id);
    }

    writer.write_len(chunk.block_data_count())?;
    for (index, data) in chunk.block_data_entries() {
        writer.write_u16(index);
        data.write_indexed(&mut writer)?;
    }

    Ok(writer.into_bytes())
}

/// Decode a chunk at `pos` from its stored form
///
/// The returned chunk is clean.
pub fn decode_chunk(
    pos: ChunkPos,
    bytes: &[u8],
    registry: &Arc<DataTypeRegistry>,
) -> Result<Chunk> {
    let mut reader = BinaryReader::new(bytes);
    let chunk = read_chunk(pos, &mut reader, &DecodeContext::new(registry))?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes(reader.remaining()).into());
    }
    Ok(chunk)
}

fn read_chunk(
    pos: ChunkPos,
    reader: &mut BinaryReader<'_>,
    ctx: &DecodeContext<'_>,
) -> DecodeResult<Chunk> {
    let mut chunk = Chunk::new(pos);

    let block_count = reader.read_len()?;
    if block_count > BLOCKS_PER_CHUNK {
        return Err(DecodeError::Invalid(format!(
            "{} blocks exceed chunk capacity",
            block_count
        )));
    }
    for _ in 0..block_count {
        let index = reader.read_u16()?;
        let id = reader.read_u16()?;
        chunk.set_block_at(index, id);
    }

    let data_count = reader.read_len()?;
    if data_count > BLOCKS_PER_CHUNK {
        return Err(DecodeError::Invalid(format!(
            "{} block data entries exceed chunk capacity",
            data_count
        )));
    }
    for _ in 0..data_count {
        let index = reader.read_u16()?;
        let data = SerializableData::read_indexed(reader, ctx)?;
        chunk.set_block_data_at(index, Some(data));
    }

    chunk.mark_clean();
    Ok(chunk)
}

/// Chunk loader persisting through a [`StorageLocation`]
#[derive(Debug, Clone)]
pub struct StorageChunkLoader {
    location: Arc<StorageLocation>,
}

impl StorageChunkLoader {
    /// Loader storing chunks in `location`
    pub fn new(location: Arc<StorageLocation>) -> Self {
        StorageChunkLoader { location }
    }

    /// Location chunks are stored in
    pub fn location(&self) -> &Arc<StorageLocation> {
        &self.location
    }

    fn read(&self, pos: ChunkPos, bytes: &[u8]) -> Result<Chunk> {
        let key = pos.storage_key();
        decode_chunk(pos, bytes, self.location.registry()).map_err(|e| e.with_key(&key))
    }
}

impl ChunkLoader for StorageChunkLoader {
    /// Absent when nothing is stored for `pos`. A failed backend read is
    /// still accepted and delivered to the callback as an error.
    fn load_chunk(
        &self,
        instance: &InstanceContainer,
        pos: ChunkPos,
        callback: ChunkCallback,
    ) -> ChunkLoadStatus {
        let key = pos.storage_key();
        match self.location.get_bytes(&key) {
            Ok(None) => {
                debug!(instance = %instance.id(), key = %key, "Chunk absent from storage");
                ChunkLoadStatus::Absent
            }
            Ok(Some(bytes)) => {
                debug!(instance = %instance.id(), key = %key, bytes = bytes.len(), "Loading chunk");
                callback(self.read(pos, &bytes));
                ChunkLoadStatus::Accepted
            }
            Err(e) => {
                callback(Err(e));
                ChunkLoadStatus::Accepted
            }
        }
    }

    fn save_chunk(&self, chunk: &Chunk, callback: SaveCallback) {
        let key = chunk.pos().storage_key();
        let result = encode_chunk(chunk).and_then(|bytes| {
            debug!(key = %key, bytes = bytes.len(), "Saving chunk");
            self.location.set_bytes(&key, &bytes)
        });
        callback(result);
    }

    fn supports_parallel_saving(&self) -> bool {
        self.location.supports_parallel_saving()
    }

    fn supports_parallel_loading(&self) -> bool {
        self.location.supports_parallel_loading()
    }
}
