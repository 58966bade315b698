//! Dynamic Settings Module
//!
//! Client-side cache over a remote, namespaced, watchable key-value store.
//! Settings are fetched on first access, kept current through a per-key
//! watch, and exposed through typed accessors.

// Public exports
pub mod contract;
pub use contract::{client::SettingsApi, error::SettingsError, KeyValue, Revision, WatchEvent};

pub mod module;
pub use module::SettingsServiceModule;

pub mod config;
pub use config::Config;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
