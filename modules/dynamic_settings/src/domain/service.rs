//! Domain service - cached settings lookup orchestration

use super::cache::{CacheLayer, KeyLocks};
use super::parse;
use super::repository::{SettingsStore, StoreError};
use super::watch::WatchSupervisor;
use crate::contract::{KeyValue, SettingsError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Domain service for settings lookup
///
/// Reads are served from the cache when possible. A miss fetches the key
/// from the store, opens a watch on it and only then caches the value, so an
/// entry never exists without a watch keeping it current. Concurrent misses
/// on the same key are serialized: one caller fetches, the others are served
/// from the cache it populated.
///
/// Writes go straight to the store and do not touch the cache. Readers in
/// this process observe a write only once its change event arrives.
pub struct Service {
    store: Arc<dyn SettingsStore>,
    cache: Arc<CacheLayer>,
    locks: Arc<KeyLocks>,
    supervisor: WatchSupervisor,
    request_timeout: Option<Duration>,
}

impl Service {
    /// Create a new service instance
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let cache = Arc::new(CacheLayer::new());
        let locks = Arc::new(KeyLocks::new());
        let supervisor = WatchSupervisor::new(cache.clone(), locks.clone());
        Self {
            store,
            cache,
            locks,
            supervisor,
            request_timeout: None,
        }
    }

    /// Bound every store request (get, put, watch open) by `timeout`
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    // ===== Lookup Operations =====

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_string(&self, key: &str) -> Result<String, SettingsError> {
        if let Some(value) = self.cache.load(key) {
            debug!("Setting found in cache");
            return Ok(value);
        }

        let _guard = self.locks.lock(key).await;
        // Another caller may have populated the key while we waited
        if let Some(value) = self.cache.load(key) {
            debug!("Setting populated by concurrent lookup");
            return Ok(value);
        }

        self.populate(key).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_int64(&self, key: &str) -> Result<i64, SettingsError> {
        let raw = self.get_string(key).await?;
        parse::parse_int64(key, &raw).inspect_err(|e| warn!(key, error = %e, "Invalid setting"))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_uint64(&self, key: &str) -> Result<u64, SettingsError> {
        let raw = self.get_string(key).await?;
        parse::parse_uint64(key, &raw).inspect_err(|e| warn!(key, error = %e, "Invalid setting"))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_bool(&self, key: &str) -> Result<bool, SettingsError> {
        let raw = self.get_string(key).await?;
        parse::parse_bool(key, &raw).inspect_err(|e| warn!(key, error = %e, "Invalid setting"))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_duration(&self, key: &str) -> Result<Duration, SettingsError> {
        let raw = self.get_string(key).await?;
        parse::parse_duration(key, &raw).inspect_err(|e| warn!(key, error = %e, "Invalid setting"))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_url(&self, key: &str) -> Result<Url, SettingsError> {
        let raw = self.get_string(key).await?;
        parse::parse_url(key, &raw).inspect_err(|e| warn!(key, error = %e, "Invalid setting"))
    }

    /// Fetch `keys` one after another.
    ///
    /// The first failure is returned and the partial result discarded. Keys
    /// fetched before the failure stay cached.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list_strings(&self, keys: &[&str]) -> Result<HashMap<String, String>, SettingsError> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = self.get_string(key).await.inspect_err(|e| {
                debug!(key, error = %e, "Aborting settings batch lookup");
            })?;
            values.insert((*key).to_string(), value);
        }
        Ok(values)
    }

    // ===== Write Operations =====

    /// Write `value` to the store. Does not update the cache.
    #[tracing::instrument(skip(self, value), level = "debug")]
    pub async fn save_string(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let revision = self.call(key, self.store.put(key, value)).await?;
        debug!(value, revision, "Setting updated");
        Ok(())
    }

    // ===== Lifecycle & Diagnostics =====

    /// Stop all watches, evicting their entries. Returns `false` on timeout.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.supervisor.shutdown(timeout).await
    }

    /// Whether `key` is currently served from the cache
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    /// Keys currently held in the cache
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    /// Number of live watch subscriptions
    pub fn active_watches(&self) -> usize {
        self.supervisor.active_watches()
    }

    // ===== Helper Methods =====

    /// Fetch, watch and cache a key. Caller holds the key's population lock.
    async fn populate(&self, key: &str) -> Result<String, SettingsError> {
        let KeyValue { value, revision } = self
            .call(key, self.store.get(key))
            .await?
            .ok_or_else(|| {
                debug!(key, "Setting not found in store");
                SettingsError::NotFound {
                    key: key.to_string(),
                }
            })?;

        match self.call(key, self.store.watch(key, revision)).await {
            Ok(stream) => {
                self.cache.store(key, value.clone());
                self.supervisor.arm(key, revision, stream);
            }
            Err(e) => {
                warn!(key, error = %e, "Serving setting uncached, watch could not be opened");
            }
        }

        Ok(value)
    }

    /// Run a store request under the configured timeout, mapping failures
    /// to [`SettingsError::Unavailable`].
    async fn call<T>(
        &self,
        key: &str,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, SettingsError> {
        let result = match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, request).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::unavailable(format!(
                    "request timed out after {:?}",
                    timeout
                ))),
            },
            None => request.await,
        };

        result.map_err(|e| {
            error!(key, error = %e, "Settings store request failed");
            SettingsError::Unavailable {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
    }
}
