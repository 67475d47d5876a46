//! Integration tests for the instance registry
//!
//! - Concurrent registration loses nothing and registers nothing twice
//! - Listings taken during registration are consistent snapshots
//! - Shared instances persist through their container's storage

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use worldstore_core::{ChunkPos, DimensionType, InstanceId};
use worldstore_instance::{Instance, InstanceContainer, InstanceManager};
use worldstore_storage::{DataTypeRegistry, MemoryBackend, StorageLocation, StorageOptions};

fn location() -> Arc<StorageLocation> {
    Arc::new(
        StorageLocation::open(
            Box::new(MemoryBackend::new()),
            "world",
            &StorageOptions::default(),
            Arc::new(DataTypeRegistry::with_defaults()),
        )
        .unwrap(),
    )
}

#[test]
fn test_concurrent_registration_is_lossless() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let manager = Arc::new(InstanceManager::new());
    let root = manager.create_container_default();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let manager = Arc::clone(&manager);
            let root = Arc::clone(&root);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut ids = Vec::new();
                for i in 0..PER_THREAD {
                    if (t + i) % 2 == 0 {
                        ids.push(manager.create_container_default().id());
                    } else {
                        ids.push(manager.create_shared(&root).unwrap().id());
                    }
                }
                ids
            })
        })
        .collect();

    let mut created = HashSet::new();
    for h in handles {
        for id in h.join().unwrap() {
            assert!(created.insert(id), "identifier reused");
        }
    }

    let listed: HashSet<InstanceId> = manager.list_instances().iter().map(Instance::id).collect();
    assert_eq!(manager.len(), THREADS * PER_THREAD + 1);
    assert_eq!(listed.len(), manager.len());
    assert!(created.iter().all(|id| listed.contains(id)));

    let shared_count = manager
        .list_instances()
        .iter()
        .filter(|i| i.as_shared().is_some())
        .count();
    assert_eq!(root.shared_instances().len(), shared_count);
}

#[test]
fn test_concurrent_register_same_container_once() {
    const THREADS: usize = 8;

    let manager = Arc::new(InstanceManager::new());
    let container = Arc::new(InstanceContainer::new(
        InstanceId::new(),
        DimensionType::End,
        None,
    ));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.register_container(container);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(manager.len(), 1);
    assert!(container.is_registered());
}

#[test]
fn test_listing_during_registration_sees_only_registered() {
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 50;

    let manager = Arc::new(InstanceManager::new());
    let barrier = Arc::new(Barrier::new(WRITERS + 1));

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..PER_WRITER {
                    manager.create_container_default();
                }
            })
        })
        .collect();

    let reader = {
        let manager = Arc::clone(&manager);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut last = 0;
            for _ in 0..200 {
                let snapshot = manager.list_instances();
                assert!(snapshot.len() >= last, "snapshots never shrink");
                assert!(snapshot.iter().all(Instance::is_registered));
                last = snapshot.len();
            }
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    reader.join().unwrap();
    assert_eq!(manager.len(), WRITERS * PER_WRITER);
}

#[test]
fn test_shared_instance_reads_container_storage() {
    let manager = InstanceManager::new();
    let location = location();
    let container = manager.create_container(DimensionType::Overworld, Some(Arc::clone(&location)));
    let shared = manager.create_shared(&container).unwrap();

    let storage = shared.storage_location().unwrap();
    storage.set_typed("spawn_radius", &16i32).unwrap();
    assert_eq!(location.get_typed::<i32>("spawn_radius").unwrap(), Some(16));

    let chunk = container.load_chunks(&[ChunkPos::new(0, 0)]).unwrap().remove(0);
    chunk.write().set_block(8, 64, 8, 1);
    container.save_chunks().unwrap();

    let reader = manager.create_container(DimensionType::Overworld, Some(location));
    let reloaded = reader.load_chunks(&[ChunkPos::new(0, 0)]).unwrap().remove(0);
    assert_eq!(reloaded.read().get_block(8, 64, 8), Some(1));
    assert!(Arc::ptr_eq(
        &shared.get_chunk(ChunkPos::new(0, 0)).unwrap(),
        &chunk
    ));
}
