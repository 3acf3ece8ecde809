//! Storage backends and initial data

pub mod in_memory;
pub mod seed;

pub use crate::core::service::{AccountStore, FormStore};
pub use in_memory::InMemoryStore;
pub use seed::seed_defaults;
