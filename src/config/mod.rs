pub mod types;


pub use types::*;

use crate::error::PoolError;
use crate::pool::{PoolOptions, CHECK_INTERVAL_ENV};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

impl PoolConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. When the file does not exist, built-in defaults
    /// are used, so the binary can start from environment variables alone.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: PoolConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content, path)?
        } else {
            tracing::info!("config file not found at {}, using defaults", path.display());
            PoolConfig::default()
        };

        config.apply_env_overrides();

        config.validate()?;
        tracing::info!(
            addresses = config.addresses.len(),
            diff_az_addresses = config.diff_az_addresses.len(),
            http_probe = config.http_probe.is_some(),
            directory = config.directory.is_some(),
            "loaded pool configuration"
        );
        Ok(config)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        Ok(match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(content)?,
            Some("json") => serde_json::from_str(content)?,
            Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
            None => anyhow::bail!("config file has no extension, use .toml or .json"),
        })
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("ADDRPOOL_ADDRESSES") {
            self.addresses = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get(CHECK_INTERVAL_ENV) {
            if let Ok(n) = v.trim().parse::<u64>() {
                self.health_check_interval_secs = n;
            }
        }
        if let Some(v) = get("ADDRPOOL_DIRECTORY_URL") {
            match self.directory.as_mut() {
                Some(dir) => dir.url = v,
                None => self.directory = Some(DirectoryConfig::new(v)),
            }
        }
        if let Some(v) = get("ADDRPOOL_ADMIN_LISTEN") {
            self.admin_listen = v;
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        let invalid = |msg: &str| Err(PoolError::Config(msg.to_string()));

        for addr in self.addresses.iter().chain(self.diff_az_addresses.iter()) {
            if addr.trim().is_empty() {
                return invalid("address list has an empty entry");
            }
        }
        if self.probe_concurrency == 0 {
            return invalid("probe_concurrency must be at least 1");
        }
        if let Some(ref dir) = self.directory {
            if dir.url.trim().is_empty() {
                return invalid("directory.url must not be empty");
            }
            if dir.poll_interval_secs == 0 {
                return invalid("directory.poll_interval_secs must be at least 1");
            }
        }
        Ok(())
    }

    /// Options for `AddressPool::new`. An interval of 0 leaves the choice to
    /// the environment / built-in default.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            http_probe: self.http_probe.clone(),
            diff_az_addresses: self.diff_az_addresses.clone(),
            check_interval: Some(Duration::from_secs(self.health_check_interval_secs))
                .filter(|d| !d.is_zero()),
            probe_concurrency: self.probe_concurrency,
        }
    }
}
