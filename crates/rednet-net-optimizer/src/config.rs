use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(with = "humantime_serde")]
    pub dedupe_window: Duration,
    pub max_dedupe_cache: usize,
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,
    pub batch_size: usize,
    pub max_batch_size: usize,
    pub compression_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dedupe_window: Duration::from_secs(1),
            max_dedupe_cache: 100,
            batch_timeout: Duration::from_millis(100),
            batch_size: 10,
            max_batch_size: 4096,
            compression_threshold: 512,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_dedupe_cache", self.max_dedupe_cache as i64, 1, i64::MAX)?;
        check_range("batch_size", self.batch_size as i64, 1, i64::MAX)?;
        check_range("max_batch_size", self.max_batch_size as i64, 1, i64::MAX)?;
        check_range(
            "compression_threshold",
            self.compression_threshold as i64,
            0,
            i64::MAX,
        )?;
        Ok(())
    }
}
