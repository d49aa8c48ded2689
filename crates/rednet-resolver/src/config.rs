use std::time::Duration;

use rednet_types::config::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(with = "humantime_serde")]
    pub voting_timeout: Duration,
    /// How long a dispute may sit unresolved before it is marked `expired`
    /// instead of tallied. Must exceed `voting_timeout`.
    #[serde(with = "humantime_serde")]
    pub dispute_expiry: Duration,
    pub max_disputes_per_hour: u32,
    pub min_trust_level: f64,
    /// Not specified by name in the original design notes; chosen as a
    /// quorum large enough that a single colluding voter cannot decide a
    /// dispute alone (see DESIGN.md).
    pub min_voters: u32,
    pub majority_threshold: f64,
    pub trust_decay_rate: f64,
    #[serde(with = "humantime_serde")]
    pub blacklist_duration: Duration,
    pub default_trust: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voting_timeout: Duration::from_secs(30),
            dispute_expiry: Duration::from_secs(90),
            max_disputes_per_hour: 5,
            min_trust_level: 0.1,
            min_voters: 3,
            majority_threshold: 0.66,
            trust_decay_rate: 0.1,
            blacklist_duration: Duration::from_secs(3600),
            default_trust: 0.5,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_disputes_per_hour", self.max_disputes_per_hour as i64, 1, 1000)?;
        check_range("min_voters", self.min_voters as i64, 1, 1000)?;
        if self.dispute_expiry <= self.voting_timeout {
            return Err(ConfigError::OutOfRange {
                field: "dispute_expiry",
                value: self.dispute_expiry.as_secs() as i64,
                min: self.voting_timeout.as_secs() as i64 + 1,
                max: i64::MAX,
            });
        }
        for (field, value) in [
            ("min_trust_level", self.min_trust_level),
            ("majority_threshold", self.majority_threshold),
            ("trust_decay_rate", self.trust_decay_rate),
            ("default_trust", self.default_trust),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: (value * 100.0) as i64,
                    min: 0,
                    max: 100,
                });
            }
        }
        Ok(())
    }
}
