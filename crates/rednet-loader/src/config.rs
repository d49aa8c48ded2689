use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub max_concurrent: usize,
    #[serde(with = "humantime_serde")]
    pub load_timeout: Duration,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            load_timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_concurrent", self.max_concurrent as i64, 1, 10)?;
        check_range("load_timeout", self.load_timeout.as_secs() as i64, 1, 60)
    }
}
