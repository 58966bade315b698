//! Storage layer - backing store implementations

pub mod memory;
pub mod namespace;

pub use memory::InMemorySettingsStore;
pub use namespace::NamespacedStore;
