use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(with = "humantime_serde")]
    pub max_execution_time: Duration,
    pub max_output_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_execution_time: Duration::from_secs(2),
            max_output_bytes: 64 * 1024,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_output_bytes", self.max_output_bytes as i64, 1, i64::MAX)
    }
}
