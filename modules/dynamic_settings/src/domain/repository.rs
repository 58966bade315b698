//! Backing store trait for settings data access
//!
//! This trait defines the interface to the remote, watchable key-value store.
//! Implementations are in infra/storage.

use crate::contract::{KeyValue, Revision, WatchEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors raised by a backing store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backing store unavailable: {message}")]
    Unavailable { message: String },
    #[error("watch stream failed: {message}")]
    Watch { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch {
            message: message.into(),
        }
    }
}

/// Ordered change events for one key. Ends when the subscription closes.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, StoreError>>;

/// Remote, namespaced, watchable key-value store of record for settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the current value of a key, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, StoreError>;

    /// Unconditionally write a key, returning the new revision
    async fn put(&self, key: &str, value: &str) -> Result<Revision, StoreError>;

    /// Subscribe to changes of a key made after revision `after`.
    ///
    /// If the key changed after `after` before the subscription was
    /// registered, its current state is delivered first. The stream is not
    /// restarted when it ends.
    async fn watch(&self, key: &str, after: Revision) -> Result<WatchStream, StoreError>;
}
