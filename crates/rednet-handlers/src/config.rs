use std::path::PathBuf;
use std::time::Duration;

use rednet_types::config::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory local filesystem paths are resolved against.
    pub root_dir: PathBuf,
    /// Extensions tried, in order, as `index.<ext>` when a local path
    /// resolves to a directory.
    pub index_extensions: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            index_extensions: vec!["rwml".to_string(), "html".to_string(), "htm".to_string(), "txt".to_string()],
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_extensions.is_empty() {
            return Err(ConfigError::NotPositive {
                field: "index_extensions",
            });
        }
        Ok(())
    }
}
