//! Key prefixing so several logical settings stores can share one cluster

use crate::contract::{KeyValue, Revision};
use crate::domain::repository::{SettingsStore, StoreError, WatchStream};
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a store and prefixes every key with a fixed namespace
pub struct NamespacedStore {
    inner: Arc<dyn SettingsStore>,
    prefix: String,
}

impl NamespacedStore {
    pub fn new(inner: Arc<dyn SettingsStore>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl SettingsStore for NamespacedStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, StoreError> {
        self.inner.get(&self.full_key(key)).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<Revision, StoreError> {
        self.inner.put(&self.full_key(key), value).await
    }

    async fn watch(&self, key: &str, after: Revision) -> Result<WatchStream, StoreError> {
        self.inner.watch(&self.full_key(key), after).await
    }
}
