use crate::pool::HttpProbeOptions;
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a `T` that implements `Default`, treating JSON `null` the same
/// as a missing field. Use with:
///   `#[serde(default, deserialize_with = "deserialize_null_default")]`
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level configuration for the `addrpool` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Initial Default tier ("host:port").
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub addresses: Vec<String>,

    /// Pre-seeded DiffAz tier.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub diff_az_addresses: Vec<String>,

    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Probes in flight at once during a cycle.
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// When absent, endpoints are probed with a bare TCP connect.
    #[serde(default)]
    pub http_probe: Option<HttpProbeOptions>,

    /// Directory to resync the zone tiers from.
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,

    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            diff_az_addresses: Vec::new(),
            health_check_interval_secs: default_health_check_interval(),
            probe_concurrency: default_probe_concurrency(),
            http_probe: None,
            directory: None,
            admin_listen: default_admin_listen(),
        }
    }
}

fn default_health_check_interval() -> u64 {
    15
}

fn default_probe_concurrency() -> usize {
    1
}

fn default_admin_listen() -> String {
    "0.0.0.0:9091".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Instance list URL; the response is `{"instances": [...]}`.
    pub url: String,

    #[serde(default = "default_directory_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,
}

impl DirectoryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            poll_interval_secs: default_directory_poll_interval(),
            timeout_secs: default_directory_timeout(),
        }
    }
}

fn default_directory_poll_interval() -> u64 {
    30
}

fn default_directory_timeout() -> u64 {
    10
}
