//! Shared cookies (spec §4.5): per-domain jar with lazy expiry and JSON
//! persistence to a fixed path (spec §4.12 "Persistence" convention).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rednet_types::config::resolve_path;
use rednet_types::{now_ms, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::SharedError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub expires: Option<Timestamp>,
    pub path: String,
    pub secure: bool,
}

impl Cookie {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires.is_some_and(|exp| exp <= now)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieOptions {
    pub expires: Option<Timestamp>,
    pub path: Option<String>,
    pub secure: Option<bool>,
}

#[derive(Default, Serialize, Deserialize)]
pub struct CookieJar {
    domains: HashMap<String, Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data).unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), SharedError> {
        let resolved = resolve_path(path).map_err(|e| SharedError::Persistence(e.to_string()))?;
        let data = serde_json::to_string_pretty(self).map_err(|e| SharedError::Persistence(e.to_string()))?;
        std::fs::write(resolved, data).map_err(|e| SharedError::Persistence(e.to_string()))
    }

    pub fn set_cookie(&mut self, domain: &str, name: &str, value: &str, options: CookieOptions) {
        let bucket = self.domains.entry(domain.to_string()).or_default();
        bucket.retain(|c| c.name != name);
        bucket.push(Cookie {
            name: name.to_string(),
            value: value.to_string(),
            expires: options.expires,
            path: options.path.unwrap_or_else(|| "/".to_string()),
            secure: options.secure.unwrap_or(false),
        });
    }

    pub fn get_cookie(&mut self, domain: &str, name: &str) -> Option<Cookie> {
        self.purge_expired(domain);
        self.domains.get(domain).and_then(|bucket| bucket.iter().find(|c| c.name == name).cloned())
    }

    pub fn get_all_cookies(&mut self, domain: &str) -> Vec<Cookie> {
        self.purge_expired(domain);
        self.domains.get(domain).cloned().unwrap_or_default()
    }

    pub fn clear_cookies(&mut self, domain: &str) {
        self.domains.remove(domain);
    }

    fn purge_expired(&mut self, domain: &str) {
        let now = now_ms();
        if let Some(bucket) = self.domains.get_mut(domain) {
            bucket.retain(|c| !c.is_expired(now));
        }
    }
}

pub fn default_cookies_path() -> PathBuf {
    PathBuf::from("rednet-data/cookies.json")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut jar = CookieJar::new();
        jar.set_cookie("shop.comp1.rednet", "session", "abc", CookieOptions::default());
        let cookie = jar.get_cookie("shop.comp1.rednet", "session").unwrap();
        assert_eq!(cookie.value, "abc");
    }

    #[test]
    fn expired_cookie_is_purged_lazily() {
        let mut jar = CookieJar::new();
        jar.set_cookie(
            "shop.comp1.rednet",
            "session",
            "abc",
            CookieOptions {
                expires: Some(now_ms() - 1),
                ..Default::default()
            },
        );
        assert!(jar.get_cookie("shop.comp1.rednet", "session").is_none());
    }

    #[test]
    fn save_and_load_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let mut jar = CookieJar::new();
        jar.set_cookie("shop.comp1.rednet", "session", "abc", CookieOptions::default());
        jar.save(&path).unwrap();

        let mut reloaded = CookieJar::load(&path).unwrap();
        assert_eq!(reloaded.get_cookie("shop.comp1.rednet", "session").unwrap().value, "abc");
    }
}
