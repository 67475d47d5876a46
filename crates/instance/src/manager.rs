//! Instance registry
//!
//! Tracks every live world instance and enforces how instances compose:
//!
//! - A shared instance can only be registered once it has a container
//! - A shared instance is only accepted when its container is live in the
//!   same registry
//! - Registering a shared instance records the link on its container
//!
//! ## Live Set
//!
//! The live set is copy-on-write: registration clones the current list under
//! a write lock and swaps in the new one, while `list_instances` only clones
//! the `Arc` of the current list. A listing is an immutable snapshot and
//! never blocks registration for longer than that `Arc` clone.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use worldstore_core::{DimensionType, Error, InstanceId, Result};
use worldstore_storage::StorageLocation;

use crate::instance::{Instance, InstanceContainer, SharedInstance};

/// Registry of live instances
#[derive(Debug, Default)]
pub struct InstanceManager {
    instances: RwLock<Arc<Vec<Instance>>>,
}

impl InstanceManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `instance` to the live set and mark it registered
    ///
    /// Registering an instance that is already live is a no-op. Returns
    /// whether the instance was added.
    fn register(&self, instance: Instance) -> bool {
        let mut guard = self.instances.write();
        Self::push_live(&mut guard, instance)
    }

    fn push_live(live: &mut Arc<Vec<Instance>>, instance: Instance) -> bool {
        if live.iter().any(|existing| existing.id() == instance.id()) {
            return false;
        }
        instance.set_registered(true);
        let mut next = Vec::with_capacity(live.len() + 1);
        next.extend(live.iter().cloned());
        next.push(instance);
        *live = Arc::new(next);
        true
    }

    /// Register a container
    pub fn register_container(&self, container: Arc<InstanceContainer>) -> Arc<InstanceContainer> {
        if self.register(Instance::Container(Arc::clone(&container))) {
            info!(
                instance = %container.id(),
                dimension = %container.dimension(),
                has_storage = container.storage_location().is_some(),
                "Registered instance container"
            );
        }
        container
    }

    /// Create and register a container with a fresh id
    pub fn create_container(
        &self,
        dimension: DimensionType,
        storage_location: Option<Arc<StorageLocation>>,
    ) -> Arc<InstanceContainer> {
        let container = InstanceContainer::new(InstanceId::new(), dimension, storage_location);
        self.register_container(Arc::new(container))
    }

    /// Create and register an overworld container without storage
    pub fn create_container_default(&self) -> Arc<InstanceContainer> {
        self.create_container(DimensionType::Overworld, None)
    }

    /// Register a shared instance and link it to its container
    ///
    /// The container must be live in this registry. The membership check,
    /// the link and the registration happen under one write lock, so a
    /// concurrent `unregister` of the container cannot slip between them.
    ///
    /// # Errors
    ///
    /// Returns `MissingContainer` if `shared` has no container assigned, and
    /// `UnregisteredContainer` if that container is not registered here.
    pub fn register_shared(&self, shared: Arc<SharedInstance>) -> Result<Arc<SharedInstance>> {
        let container = shared
            .container()
            .ok_or(Error::MissingContainer { shared: shared.id() })?;

        let added = {
            let mut guard = self.instances.write();
            if !guard.iter().any(|live| live.id() == container.id()) {
                return Err(Error::UnregisteredContainer {
                    container: container.id(),
                });
            }
            container.add_shared_instance(&shared);
            Self::push_live(&mut guard, Instance::Shared(Arc::clone(&shared)))
        };

        if added {
            info!(
                instance = %shared.id(),
                container = %container.id(),
                "Registered shared instance"
            );
        }
        Ok(shared)
    }

    /// Create and register a shared instance delegating to `container`
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredContainer` if `container` is not registered here.
    pub fn create_shared(&self, container: &Arc<InstanceContainer>) -> Result<Arc<SharedInstance>> {
        let shared = SharedInstance::new(InstanceId::new(), Arc::clone(container));
        self.register_shared(Arc::new(shared))
    }

    /// Snapshot of every registered instance, in registration order
    pub fn list_instances(&self) -> Arc<Vec<Instance>> {
        Arc::clone(&self.instances.read())
    }

    /// Registered instance with `id`
    pub fn get(&self, id: InstanceId) -> Option<Instance> {
        self.instances
            .read()
            .iter()
            .find(|instance| instance.id() == id)
            .cloned()
    }

    /// Remove the instance with `id` from the live set
    ///
    /// Clears the registered flag. A shared instance is also unlinked from
    /// its container. A container with live shared instances may be
    /// unregistered; those keep delegating to it. Returns false if no such
    /// instance was registered.
    pub fn unregister(&self, id: InstanceId) -> bool {
        let removed = {
            let mut guard = self.instances.write();
            let Some(position) = guard.iter().position(|instance| instance.id() == id) else {
                return false;
            };
            let mut next: Vec<Instance> = guard.iter().cloned().collect();
            let removed = next.remove(position);
            *guard = Arc::new(next);
            removed
        };

        removed.set_registered(false);
        if let Instance::Shared(shared) = &removed {
            if let Some(container) = shared.container() {
                container.remove_shared_instance(id);
            }
        }
        debug!(instance = %id, "Unregistered instance");
        true
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// Whether no instance is registered
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
