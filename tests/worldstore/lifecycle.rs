//! Server lifecycle: configure, populate, shut down, restart

use std::sync::Arc;

use tempfile::TempDir;
use worldstore::{
    ChunkPos, DataContainer, DimensionType, SerializableData, StorageConfig, StorageManager,
    CONFIG_FILE_NAME,
};

use crate::common::TestWorld;

#[test]
fn config_file_drives_flush_on_close() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "flush_on_close = true\n").unwrap();
    let config = StorageConfig::load_or_create(dir.path()).unwrap();

    let world = TestWorld::with_config(config);
    let location = world.storage.location("lobby").unwrap();
    location
        .fetch_cached("player:bob")
        .unwrap()
        .write()
        .set("coins", 250i64)
        .unwrap();
    let namespace = location.path().to_string();

    world.storage.close_all().unwrap();
    assert!(world.backend.raw(&namespace, "player:bob").is_some());
}

#[test]
fn restart_restores_chunks_and_player_data() {
    let world = TestWorld::new();

    // First run
    {
        let location = world.storage.location("survival").unwrap();
        let container = world
            .instances
            .create_container(DimensionType::Overworld, Some(Arc::clone(&location)));

        let chunks = container
            .load_chunks(&[ChunkPos::new(0, 0), ChunkPos::new(-1, 2)])
            .unwrap();
        chunks[1].write().set_block(1, 70, 1, 12);
        let mut chest = SerializableData::new(Arc::clone(location.registry()));
        chest.set("slots", vec![3i32, 0, 5]).unwrap();
        chunks[1].write().set_block_data(1, 70, 1, Some(chest));
        container.save_chunks().unwrap();

        location.get_and_cache_data("instance:meta", &*container).unwrap();
        container
            .data()
            .unwrap()
            .write()
            .set("time", 6000i64)
            .unwrap();
        location.flush_all().unwrap();
        world.storage.close_all().unwrap();
    }

    // Second run over the same store
    let storage = StorageManager::new(
        StorageConfig::default(),
        Arc::clone(world.storage.registry()),
        {
            let backend = world.backend.clone();
            Arc::new(move || Box::new(backend.handle()) as Box<dyn worldstore::StorageBackend>)
        },
    );
    let location = storage.location("survival").unwrap();
    let container = world
        .instances
        .create_container(DimensionType::Overworld, Some(Arc::clone(&location)));

    let chunk = container.load_chunks(&[ChunkPos::new(-1, 2)]).unwrap().remove(0);
    let chunk = chunk.read();
    assert_eq!(chunk.get_block(1, 70, 1), Some(12));
    assert_eq!(
        chunk
            .block_data(1, 70, 1)
            .unwrap()
            .get::<Vec<i32>>("slots")
            .unwrap(),
        Some(&vec![3, 0, 5])
    );

    let meta = location.fetch_cloned("instance:meta").unwrap();
    assert_eq!(meta.get::<i64>("time").unwrap(), Some(&6000));
}
