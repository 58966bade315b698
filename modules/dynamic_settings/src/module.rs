//! Module declaration and lifecycle implementation

use crate::api::native::NativeClient;
use crate::config::Config;
use crate::contract::SettingsApi;
use crate::domain::{Service, SettingsStore};
use crate::infra::storage::NamespacedStore;
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Dynamic settings module
///
/// Owns the one [`Service`] of the process. `init` wires it over a backing
/// store, `serve` keeps it alive until the process cancels it and then stops
/// every watch.
pub struct SettingsServiceModule {
    config: RwLock<Config>,
    service: RwLock<Option<Arc<Service>>>,
}

impl Default for SettingsServiceModule {
    fn default() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            service: RwLock::new(None),
        }
    }
}

impl SettingsServiceModule {
    /// Build the service over `store` and return the client consumers use
    pub fn init(&self, config: Config, store: Arc<dyn SettingsStore>) -> Result<Arc<dyn SettingsApi>> {
        config.validate()?;

        let store: Arc<dyn SettingsStore> =
            Arc::new(NamespacedStore::new(store, config.namespace.clone()));
        let service = Arc::new(Service::new(store).with_request_timeout(config.request_timeout));

        tracing::info!(
            namespace = %config.namespace,
            request_timeout = ?config.request_timeout,
            "Dynamic settings service initialized"
        );

        *self.config.write() = config;
        *self.service.write() = Some(service.clone());

        Ok(Arc::new(NativeClient::new(service)))
    }

    /// Initialized service, for diagnostics
    pub fn service(&self) -> Result<Arc<Service>> {
        self.service
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }

    /// Run until `cancel` fires, then stop all watches
    pub async fn serve(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let service = self.service()?;

        cancel.cancelled().await;

        let timeout = self.config.read().shutdown_timeout;
        if !service.shutdown(timeout).await {
            tracing::warn!("Dynamic settings stopped with watches still running");
        }
        tracing::info!("Dynamic settings service stopped");
        Ok(())
    }
}
