//! End-to-end composition scenario

use std::sync::{Arc, Barrier};
use std::thread;

use worldstore::{DimensionType, Error, InstanceId, SharedInstance};

use crate::common::TestWorld;

#[test]
fn container_shared_storage_and_cache_scenario() {
    let world = TestWorld::new();

    // Register an empty container with storage
    let location = world.storage.location("c1").unwrap();
    let c1 = world
        .instances
        .create_container(DimensionType::Overworld, Some(Arc::clone(&location)));
    assert!(c1.is_registered());

    // A shared instance can be created for it and is linked
    let s1 = world.instances.create_shared(&c1).unwrap();
    assert!(s1.is_registered());
    assert_eq!(c1.shared_instances()[0].id(), s1.id());

    // Typed storage through the container's location
    let storage = c1.storage_location().unwrap();
    storage.set_typed("score", &42i32).unwrap();
    assert_eq!(storage.get_typed::<i32>("score").unwrap(), Some(42));
    assert_eq!(
        s1.storage_location().unwrap().get_typed::<i32>("score").unwrap(),
        Some(42)
    );

    // Two concurrent fetch_cached calls on an empty backend
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let location = Arc::clone(&location);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                location.fetch_cached("player:alice").unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results[0].read().is_empty());
    assert!(results[1].read().is_empty());
    assert!(Arc::ptr_eq(&results[0], &results[1]));
}

#[test]
fn composition_errors_are_rejected() {
    let world = TestWorld::new();

    let loose = Arc::new(worldstore::InstanceContainer::new(
        InstanceId::new(),
        DimensionType::Overworld,
        None,
    ));
    assert!(matches!(
        world.instances.create_shared(&loose),
        Err(Error::UnregisteredContainer { .. })
    ));

    let unbound = Arc::new(SharedInstance::unbound(InstanceId::new()));
    assert!(matches!(
        world.instances.register_shared(unbound),
        Err(Error::MissingContainer { .. })
    ));
    assert!(world.instances.is_empty());
}
