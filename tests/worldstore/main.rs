//! Cross-crate integration tests
//!
//! Storage, chunk persistence and the instance registry working together.

#[path = "../common/mod.rs"]
mod common;

mod lifecycle;
mod scenario;
