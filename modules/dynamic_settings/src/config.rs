//! Configuration for the dynamic settings module

use anyhow::{bail, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `DYNAMIC_SETTINGS_REQUEST_TIMEOUT=2s`
pub const ENV_PREFIX: &str = "DYNAMIC_SETTINGS_";

/// Dynamic settings configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Prefix applied to every key in the backing store
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Upper bound for a single store request (get, put, watch open)
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long shutdown waits for watch tasks to stop
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Config {
    /// Layer defaults, an optional YAML file and `DYNAMIC_SETTINGS_*`
    /// environment variables, in that order
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than zero");
        }
        if self.shutdown_timeout.is_zero() {
            bail!("shutdown_timeout must be greater than zero");
        }
        Ok(())
    }
}

fn default_namespace() -> String {
    "settings:".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}
