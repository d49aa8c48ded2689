use std::path::PathBuf;
use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub index_path: PathBuf,
    pub cache_export_path: PathBuf,
    #[serde(with = "humantime_serde")]
    pub persist_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub cache_max_memory_bytes: usize,
    pub snippet_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("rednet-data/search-index.json"),
            cache_export_path: PathBuf::from("rednet-data/search-cache.json"),
            persist_interval: Duration::from_secs(300),
            cache_ttl: Duration::from_secs(300),
            cache_max_entries: 200,
            cache_max_memory_bytes: 10 * 1024 * 1024,
            snippet_length: 150,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("cache_max_entries", self.cache_max_entries as i64, 1, i64::MAX)?;
        check_range("cache_max_memory_bytes", self.cache_max_memory_bytes as i64, 1, i64::MAX)?;
        check_range("snippet_length", self.snippet_length as i64, 20, 2000)?;
        Ok(())
    }
}
