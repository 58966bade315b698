//! Native client implementation - wraps domain service for in-process calls

use crate::contract::{SettingsApi, SettingsError};
use crate::domain::Service;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Native client implementation that directly calls the domain service
///
/// Handed out by the module to every in-process consumer as
/// `Arc<dyn SettingsApi>`.
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    /// Create a new native client
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SettingsApi for NativeClient {
    async fn get_string(&self, key: &str) -> Result<String, SettingsError> {
        self.service.get_string(key).await
    }

    async fn get_int64(&self, key: &str) -> Result<i64, SettingsError> {
        self.service.get_int64(key).await
    }

    async fn get_uint64(&self, key: &str) -> Result<u64, SettingsError> {
        self.service.get_uint64(key).await
    }

    async fn get_bool(&self, key: &str) -> Result<bool, SettingsError> {
        self.service.get_bool(key).await
    }

    async fn get_duration(&self, key: &str) -> Result<Duration, SettingsError> {
        self.service.get_duration(key).await
    }

    async fn get_url(&self, key: &str) -> Result<Url, SettingsError> {
        self.service.get_url(key).await
    }

    async fn list_strings(&self, keys: &[&str]) -> Result<HashMap<String, String>, SettingsError> {
        self.service.list_strings(keys).await
    }

    async fn save_string(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.service.save_string(key, value).await
    }
}
