use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(with = "humantime_serde")]
    pub cache_timeout: Duration,
    pub max_cache_entries: usize,
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub propagation_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub verification_timeout: Duration,
    pub max_domain_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_timeout: Duration::from_secs(300),
            max_cache_entries: 1000,
            query_timeout: Duration::from_secs(5),
            max_retries: 3,
            propagation_delay: Duration::from_secs(2),
            verification_timeout: Duration::from_secs(10),
            max_domain_length: 32,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_cache_entries", self.max_cache_entries as i64, 1, i64::MAX)?;
        check_range("max_retries", self.max_retries as i64, 0, 100)?;
        check_range("max_domain_length", self.max_domain_length as i64, 1, 255)?;
        Ok(())
    }
}
