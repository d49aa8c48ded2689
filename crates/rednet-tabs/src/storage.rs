//! Per-tab cookies and local storage (spec §4.6): same expiry semantics as
//! the shared cookie jar, but scoped to the tab; in privacy mode, writes are
//! accepted but never retained.

use std::collections::HashMap;

use rednet_types::{now_ms, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedCookie {
    pub value: String,
    pub expires: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabStorage {
    cookies: HashMap<String, HashMap<String, ScopedCookie>>,
    local_storage: HashMap<String, HashMap<String, String>>,
}

impl TabStorage {
    pub fn set_cookie(&mut self, privacy_mode: bool, domain: &str, name: &str, value: &str, expires: Option<Timestamp>) {
        if privacy_mode {
            return;
        }
        self.cookies
            .entry(domain.to_string())
            .or_default()
            .insert(name.to_string(), ScopedCookie { value: value.to_string(), expires });
    }

    pub fn get_cookie(&mut self, domain: &str, name: &str) -> Option<String> {
        self.purge_expired(domain);
        self.cookies.get(domain)?.get(name).map(|c| c.value.clone())
    }

    fn purge_expired(&mut self, domain: &str) {
        let now = now_ms();
        if let Some(bucket) = self.cookies.get_mut(domain) {
            bucket.retain(|_, c| c.expires.is_none_or(|exp| exp > now));
        }
    }

    pub fn set_local_storage(&mut self, privacy_mode: bool, domain: &str, key: &str, value: &str) {
        if privacy_mode {
            return;
        }
        self.local_storage.entry(domain.to_string()).or_default().insert(key.to_string(), value.to_string());
    }

    pub fn get_local_storage(&self, domain: &str, key: &str) -> Option<&String> {
        self.local_storage.get(domain)?.get(key)
    }

    /// A pure snapshot with expired cookies filtered, suitable for
    /// serializing the tab (spec §4.6 "Serialization").
    pub fn live_cookies(&self) -> HashMap<String, HashMap<String, ScopedCookie>> {
        let now = now_ms();
        self.cookies
            .iter()
            .map(|(domain, bucket)| {
                let live = bucket
                    .iter()
                    .filter(|(_, c)| c.expires.is_none_or(|exp| exp > now))
                    .map(|(name, c)| (name.clone(), c.clone()))
                    .collect();
                (domain.clone(), live)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_mode_discards_writes() {
        let mut storage = TabStorage::default();
        storage.set_cookie(true, "d", "a", "1", None);
        assert!(storage.get_cookie("d", "a").is_none());
    }

    #[test]
    fn expired_cookie_is_purged_on_read() {
        let mut storage = TabStorage::default();
        storage.set_cookie(false, "d", "a", "1", Some(now_ms() - 1));
        assert!(storage.get_cookie("d", "a").is_none());
    }

    #[test]
    fn local_storage_round_trips() {
        let mut storage = TabStorage::default();
        storage.set_local_storage(false, "d", "k", "v");
        assert_eq!(storage.get_local_storage("d", "k").unwrap(), "v");
    }
}
