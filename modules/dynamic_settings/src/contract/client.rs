//! Native client trait for inter-module communication
//!
//! Every consumer reads configuration through this trait and never talks to
//! the backing store directly.

use super::error::SettingsError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Dynamic settings API for inter-module communication
///
/// Reads are served from an in-process cache that is kept current by a
/// watch on each cached key. Writes are NOT read-your-writes consistent:
/// after [`SettingsApi::save_string`] returns, readers in this process keep
/// seeing the previous value until the change event arrives on the watch.
#[async_trait]
pub trait SettingsApi: Send + Sync {
    /// Raw string value of a setting
    async fn get_string(&self, key: &str) -> Result<String, SettingsError>;

    /// Base-10 signed integer setting
    async fn get_int64(&self, key: &str) -> Result<i64, SettingsError>;

    /// Base-10 unsigned integer setting
    async fn get_uint64(&self, key: &str) -> Result<u64, SettingsError>;

    /// Boolean setting (`1`, `t`, `true`, `0`, `f`, `false`, ...)
    async fn get_bool(&self, key: &str) -> Result<bool, SettingsError>;

    /// Duration setting (`1h30m`, `300ms`, `PT90S`, ...)
    async fn get_duration(&self, key: &str) -> Result<Duration, SettingsError>;

    /// Absolute URL setting
    async fn get_url(&self, key: &str) -> Result<Url, SettingsError>;

    /// Fetch several settings; the first failure aborts the whole call
    async fn list_strings(&self, keys: &[&str]) -> Result<HashMap<String, String>, SettingsError>;

    /// Write a setting to the backing store
    async fn save_string(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}
