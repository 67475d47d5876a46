//! World instances
//!
//! - [`InstanceContainer`] owns its chunks and (optionally) a storage location
//! - [`SharedInstance`] owns nothing persistent and delegates every persisted
//!   read to exactly one container
//! - [`Instance`] is either of the two, compared and hashed by id
//!
//! A container tracks its shared instances weakly; a shared instance holds
//! its container strongly.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use worldstore_core::{BackendError, ChunkPos, DimensionType, Error, InstanceId, Result};
use worldstore_storage::{DataContainer, SharedData, StorageLocation};

use crate::chunk::{Chunk, SharedChunk};
use crate::loader::{ChunkLoadStatus, ChunkLoader, NullChunkLoader};
use crate::storage_loader::StorageChunkLoader;

type ChunkMap = Arc<RwLock<FxHashMap<ChunkPos, SharedChunk>>>;

/// Insert a loaded chunk, keeping the first one if another load won the race
fn insert_chunk(chunks: &ChunkMap, chunk: Chunk) -> SharedChunk {
    let mut map = chunks.write();
    Arc::clone(map.entry(chunk.pos()).or_insert_with(|| chunk.into_shared()))
}

/// Instance owning its own persisted world state
pub struct InstanceContainer {
    id: InstanceId,
    dimension: DimensionType,
    storage_location: Option<Arc<StorageLocation>>,
    chunk_loader: Arc<dyn ChunkLoader>,
    chunks: ChunkMap,
    shared_instances: RwLock<Vec<Weak<SharedInstance>>>,
    registered: AtomicBool,
    data: RwLock<Option<SharedData>>,
}

impl InstanceContainer {
    /// Create an unregistered container
    ///
    /// Chunks persist through `storage_location` when one is given;
    /// otherwise every chunk starts empty and saves are discarded.
    pub fn new(
        id: InstanceId,
        dimension: DimensionType,
        storage_location: Option<Arc<StorageLocation>>,
    ) -> Self {
        let chunk_loader: Arc<dyn ChunkLoader> = match &storage_location {
            Some(location) => Arc::new(StorageChunkLoader::new(Arc::clone(location))),
            None => Arc::new(NullChunkLoader),
        };
        Self::with_chunk_loader(id, dimension, storage_location, chunk_loader)
    }

    /// Create an unregistered container with a custom chunk loader
    pub fn with_chunk_loader(
        id: InstanceId,
        dimension: DimensionType,
        storage_location: Option<Arc<StorageLocation>>,
        chunk_loader: Arc<dyn ChunkLoader>,
    ) -> Self {
        InstanceContainer {
            id,
            dimension,
            storage_location,
            chunk_loader,
            chunks: Arc::new(RwLock::new(FxHashMap::default())),
            shared_instances: RwLock::new(Vec::new()),
            registered: AtomicBool::new(false),
            data: RwLock::new(None),
        }
    }

    /// Instance id
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Dimension
    pub fn dimension(&self) -> DimensionType {
        self.dimension
    }

    /// Storage location, if the container has one
    pub fn storage_location(&self) -> Option<&Arc<StorageLocation>> {
        self.storage_location.as_ref()
    }

    /// Chunk loader
    pub fn chunk_loader(&self) -> &Arc<dyn ChunkLoader> {
        &self.chunk_loader
    }

    /// Whether the container is in an instance registry
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }

    // ========================================================================
    // Chunks
    // ========================================================================

    /// Loaded chunk at `pos`
    pub fn get_chunk(&self, pos: ChunkPos) -> Option<SharedChunk> {
        self.chunks.read().get(&pos).cloned()
    }

    /// Positions of every loaded chunk, sorted
    pub fn loaded_chunks(&self) -> Vec<ChunkPos> {
        let mut positions: Vec<ChunkPos> = self.chunks.read().keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Load the chunk at `pos` and hand it to `callback`
    ///
    /// An already loaded chunk is handed over immediately. When the loader
    /// reports the chunk absent, an empty chunk is created in its place.
    /// A failed load leaves the chunk unloaded.
    pub fn load_chunk<F>(&self, pos: ChunkPos, callback: F) -> ChunkLoadStatus
    where
        F: FnOnce(Result<SharedChunk>) + Send + 'static,
    {
        if let Some(chunk) = self.get_chunk(pos) {
            callback(Ok(chunk));
            return ChunkLoadStatus::Accepted;
        }

        let chunks = Arc::clone(&self.chunks);
        let callback = Arc::new(Mutex::new(Some(callback)));
        let on_loaded = Arc::clone(&callback);

        let status = self.chunk_loader.load_chunk(
            self,
            pos,
            Box::new(move |result| {
                let result = result.map(|chunk| insert_chunk(&chunks, chunk));
                let callback = on_loaded.lock().take();
                if let Some(callback) = callback {
                    callback(result);
                }
            }),
        );

        if status == ChunkLoadStatus::Absent {
            debug!(instance = %self.id, chunk = %pos, "Creating empty chunk");
            let chunk = insert_chunk(&self.chunks, Chunk::new(pos));
            let callback = callback.lock().take();
            if let Some(callback) = callback {
                callback(Ok(chunk));
            }
        }
        status
    }

    /// Load every chunk in `positions`, waiting for all completions
    ///
    /// Loads run in parallel only when the loader supports it. Returns the
    /// chunks in `positions` order, or the first failure.
    pub fn load_chunks(&self, positions: &[ChunkPos]) -> Result<Vec<SharedChunk>> {
        let (tx, rx) = mpsc::channel();
        let dispatch = |tx: &mut mpsc::Sender<(ChunkPos, Result<SharedChunk>)>, pos: &ChunkPos| {
            let pos = *pos;
            let tx = tx.clone();
            self.load_chunk(pos, move |result| {
                let _ = tx.send((pos, result));
            });
        };

        if self.chunk_loader.supports_parallel_loading() {
            debug!(instance = %self.id, count = positions.len(), "Loading chunks in parallel");
            positions.par_iter().for_each_with(tx, |tx, pos| dispatch(tx, pos));
        } else {
            debug!(instance = %self.id, count = positions.len(), "Loading chunks sequentially");
            let mut tx = tx;
            for pos in positions {
                dispatch(&mut tx, pos);
            }
        }

        let mut loaded: FxHashMap<ChunkPos, SharedChunk> = FxHashMap::default();
        for (pos, result) in rx {
            loaded.insert(pos, result?);
        }

        positions
            .iter()
            .map(|pos| {
                loaded
                    .get(pos)
                    .cloned()
                    .or_else(|| self.get_chunk(*pos))
                    .ok_or_else(|| {
                        Error::storage_io(
                            "load_chunk",
                            Some(&pos.storage_key()),
                            BackendError::Other("load completion never delivered".to_string()),
                        )
                    })
            })
            .collect()
    }

    /// Save every loaded chunk, waiting for all completions
    ///
    /// Saves run in parallel only when the loader supports it. Successfully
    /// saved chunks are marked clean. Every chunk is attempted; the first
    /// failure is returned.
    pub fn save_chunks(&self) -> Result<()> {
        let chunks: Vec<SharedChunk> = self.chunks.read().values().cloned().collect();
        let count = chunks.len();
        let (tx, rx) = mpsc::channel();
        let loader = &self.chunk_loader;

        let dispatch = |tx: &mut mpsc::Sender<(ChunkPos, Result<()>)>, chunk: &SharedChunk| {
            let chunk = chunk.read();
            let pos = chunk.pos();
            let tx = tx.clone();
            loader.save_chunk(
                &chunk,
                Box::new(move |result| {
                    let _ = tx.send((pos, result));
                }),
            );
        };

        if loader.supports_parallel_saving() {
            debug!(instance = %self.id, count, "Saving chunks in parallel");
            chunks.par_iter().for_each_with(tx, |tx, chunk| dispatch(tx, chunk));
        } else {
            debug!(instance = %self.id, count, "Saving chunks sequentially");
            let mut tx = tx;
            for chunk in &chunks {
                dispatch(&mut tx, chunk);
            }
        }

        let mut first_error = None;
        let mut completed = 0;
        for (pos, result) in rx {
            completed += 1;
            match result {
                Ok(()) => {
                    if let Some(chunk) = self.get_chunk(pos) {
                        chunk.write().mark_clean();
                    }
                }
                Err(e) => {
                    warn!(instance = %self.id, chunk = %pos, error = %e, "Failed to save chunk");
                    first_error.get_or_insert(e);
                }
            }
        }
        if completed < count {
            warn!(instance = %self.id, count, completed, "Chunk saves completed without signalling");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Shared instances
    // ========================================================================

    /// Shared instances delegating to this container
    pub fn shared_instances(&self) -> Vec<Arc<SharedInstance>> {
        self.shared_instances
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn add_shared_instance(&self, shared: &Arc<SharedInstance>) {
        let mut links = self.shared_instances.write();
        links.retain(|link| link.strong_count() > 0);
        if !links
            .iter()
            .any(|link| link.upgrade().map_or(false, |s| s.id() == shared.id()))
        {
            links.push(Arc::downgrade(shared));
        }
    }

    pub(crate) fn remove_shared_instance(&self, id: InstanceId) {
        self.shared_instances
            .write()
            .retain(|link| link.upgrade().map_or(false, |s| s.id() != id));
    }
}

impl DataContainer for InstanceContainer {
    fn set_data(&self, data: SharedData) {
        *self.data.write() = Some(data);
    }

    fn data(&self) -> Option<SharedData> {
        self.data.read().clone()
    }
}

impl std::fmt::Debug for InstanceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceContainer")
            .field("id", &self.id)
            .field("dimension", &self.dimension)
            .field("has_storage", &self.storage_location.is_some())
            .field("chunks", &self.chunks.read().len())
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Instance delegating persisted state to one container
pub struct SharedInstance {
    id: InstanceId,
    container: OnceCell<Arc<InstanceContainer>>,
    registered: AtomicBool,
    data: RwLock<Option<SharedData>>,
}

impl SharedInstance {
    /// Shared instance bound to `container`
    pub fn new(id: InstanceId, container: Arc<InstanceContainer>) -> Self {
        let shared = Self::unbound(id);
        // A fresh cell always accepts its first value
        let _ = shared.container.set(container);
        shared
    }

    /// Shared instance with no container yet
    pub fn unbound(id: InstanceId) -> Self {
        SharedInstance {
            id,
            container: OnceCell::new(),
            registered: AtomicBool::new(false),
            data: RwLock::new(None),
        }
    }

    /// Bind to `container`
    ///
    /// The container can be assigned once; a second assignment hands the
    /// rejected container back.
    pub fn assign_container(
        &self,
        container: Arc<InstanceContainer>,
    ) -> std::result::Result<(), Arc<InstanceContainer>> {
        self.container.set(container)
    }

    /// Instance id
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Container this instance delegates to
    pub fn container(&self) -> Option<&Arc<InstanceContainer>> {
        self.container.get()
    }

    fn bound(&self) -> Result<&Arc<InstanceContainer>> {
        self.container
            .get()
            .ok_or(Error::MissingContainer { shared: self.id })
    }

    /// Dimension of the container
    pub fn dimension(&self) -> Option<DimensionType> {
        self.container().map(|c| c.dimension())
    }

    /// Storage location of the container
    pub fn storage_location(&self) -> Option<&Arc<StorageLocation>> {
        self.container().and_then(|c| c.storage_location())
    }

    /// Loaded chunk of the container
    pub fn get_chunk(&self, pos: ChunkPos) -> Option<SharedChunk> {
        self.container().and_then(|c| c.get_chunk(pos))
    }

    /// Load a chunk through the container
    ///
    /// # Errors
    ///
    /// Returns `MissingContainer` when no container is assigned.
    pub fn load_chunk<F>(&self, pos: ChunkPos, callback: F) -> Result<ChunkLoadStatus>
    where
        F: FnOnce(Result<SharedChunk>) + Send + 'static,
    {
        Ok(self.bound()?.load_chunk(pos, callback))
    }

    /// Whether the shared instance is in an instance registry
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }
}

impl DataContainer for SharedInstance {
    fn set_data(&self, data: SharedData) {
        *self.data.write() = Some(data);
    }

    fn data(&self) -> Option<SharedData> {
        self.data.read().clone()
    }
}

impl std::fmt::Debug for SharedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedInstance")
            .field("id", &self.id)
            .field("container", &self.container().map(|c| c.id()))
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Any registered world instance
#[derive(Debug, Clone)]
pub enum Instance {
    /// Instance owning its storage
    Container(Arc<InstanceContainer>),
    /// Instance delegating to a container
    Shared(Arc<SharedInstance>),
}

impl Instance {
    /// Instance id
    pub fn id(&self) -> InstanceId {
        match self {
            Instance::Container(c) => c.id(),
            Instance::Shared(s) => s.id(),
        }
    }

    /// Whether the instance is in an instance registry
    pub fn is_registered(&self) -> bool {
        match self {
            Instance::Container(c) => c.is_registered(),
            Instance::Shared(s) => s.is_registered(),
        }
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        match self {
            Instance::Container(c) => c.set_registered(registered),
            Instance::Shared(s) => s.set_registered(registered),
        }
    }

    /// Dimension, None for a shared instance with no container
    pub fn dimension(&self) -> Option<DimensionType> {
        match self {
            Instance::Container(c) => Some(c.dimension()),
            Instance::Shared(s) => s.dimension(),
        }
    }

    /// Storage location used for persisted reads
    pub fn storage_location(&self) -> Option<&Arc<StorageLocation>> {
        match self {
            Instance::Container(c) => c.storage_location(),
            Instance::Shared(s) => s.storage_location(),
        }
    }

    /// Loaded chunk at `pos`
    pub fn get_chunk(&self, pos: ChunkPos) -> Option<SharedChunk> {
        match self {
            Instance::Container(c) => c.get_chunk(pos),
            Instance::Shared(s) => s.get_chunk(pos),
        }
    }

    /// Container variant
    pub fn as_container(&self) -> Option<&Arc<InstanceContainer>> {
        match self {
            Instance::Container(c) => Some(c),
            Instance::Shared(_) => None,
        }
    }

    /// Shared variant
    pub fn as_shared(&self) -> Option<&Arc<SharedInstance>> {
        match self {
            Instance::Shared(s) => Some(s),
            Instance::Container(_) => None,
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl DataContainer for Instance {
    fn set_data(&self, data: SharedData) {
        match self {
            Instance::Container(c) => c.set_data(data),
            Instance::Shared(s) => s.set_data(data),
        }
    }

    fn data(&self) -> Option<SharedData> {
        match self {
            Instance::Container(c) => c.data(),
            Instance::Shared(s) => s.data(),
        }
    }
}

impl From<Arc<InstanceContainer>> for Instance {
    fn from(container: Arc<InstanceContainer>) -> Self {
        Instance::Container(container)
    }
}

impl From<Arc<SharedInstance>> for Instance {
    fn from(shared: Arc<SharedInstance>) -> Self {
        Instance::Shared(shared)
    }
}
