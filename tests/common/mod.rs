//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use worldstore::{
    DataTypeRegistry, InstanceManager, MemoryBackend, StorageBackend, StorageConfig,
    StorageManager,
};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are harmless
pub fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Storage and instance registries wired together over one shared in-memory store
pub struct TestWorld {
    pub storage: StorageManager,
    pub instances: InstanceManager,
    pub backend: MemoryBackend,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    pub fn with_config(config: StorageConfig) -> Self {
        init_test_tracing();
        let backend = MemoryBackend::new();
        let factory_backend = backend.clone();
        let storage = StorageManager::new(
            config,
            Arc::new(DataTypeRegistry::with_defaults()),
            Arc::new(move || Box::new(factory_backend.handle()) as Box<dyn StorageBackend>),
        );
        TestWorld {
            storage,
            instances: InstanceManager::new(),
            backend,
        }
    }
}
