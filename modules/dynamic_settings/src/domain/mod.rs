//! Domain layer - caching, watching and typed lookup of settings

pub mod cache;
pub mod parse;
pub mod repository;
pub mod service;
pub mod watch;

pub use cache::CacheLayer;
pub use repository::{SettingsStore, StoreError, WatchStream};
pub use service::Service;
pub use watch::WatchSupervisor;
