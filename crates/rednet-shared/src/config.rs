use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub page_cache_max_bytes: usize,
    #[serde(with = "humantime_serde")]
    pub page_cache_ttl: Duration,
    pub max_connections_per_domain: usize,
    #[serde(with = "humantime_serde")]
    pub connection_idle_timeout: Duration,
    pub max_completed_downloads: usize,
    #[serde(with = "humantime_serde")]
    pub cookie_persistence_interval: Duration,
    pub cookies_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_cache_max_bytes: 64 * 1024 * 1024,
            page_cache_ttl: Duration::from_secs(600),
            max_connections_per_domain: 6,
            connection_idle_timeout: Duration::from_secs(90),
            max_completed_downloads: 100,
            cookie_persistence_interval: Duration::from_secs(30),
            cookies_path: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("page_cache_max_bytes", self.page_cache_max_bytes as i64, 1, i64::MAX)?;
        check_range("max_connections_per_domain", self.max_connections_per_domain as i64, 1, 1024)?;
        check_range("max_completed_downloads", self.max_completed_downloads as i64, 1, i64::MAX)?;
        Ok(())
    }
}
