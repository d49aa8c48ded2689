//! The DNS cache (spec §3 "DNS cache entry", §4.3 "Cache"). Shared by DNS
//! Core and the Resolver, but only DNS Core mutates it.
//!
//! Eviction on overflow: remove expired entries first, then the oldest by
//! `resolved_at`. A `get` on an expired entry is a miss and removes it
//! (spec §8 "Cache TTL" law).

use std::collections::HashMap;
use std::time::Duration;

use rednet_types::{now_ms, NodeId, Timestamp};

use crate::registry::RecordKind;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub domain: String,
    pub owner_id: NodeId,
    pub kind: RecordKind,
    pub target: Option<String>,
    pub resolved_at: Timestamp,
    pub expires_at: Timestamp,
    /// The `ts` of the `DNS_REGISTER`/`DNS_RESPONSE` that produced this
    /// entry, used to break ties between conflicting announcements
    /// (earliest wins, spec §4.3 step 4).
    pub announced_ts: Timestamp,
}

pub struct DnsCache {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
}

impl DnsCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
        }
    }

    /// Look up `domain`, evicting it first if expired.
    pub fn get(&mut self, domain: &str) -> Option<CacheEntry> {
        let now = now_ms();
        match self.entries.get(domain) {
            Some(entry) if entry.expires_at >= now => Some(entry.clone()),
            Some(_) => {
                self.entries.remove(domain);
                None
            },
            None => None,
        }
    }

    /// Insert or refresh a cache entry for an announcement observed at
    /// `announced_ts`. Returns `true` if the entry was stored (a new
    /// domain, or this announcement precedes what we already had).
    pub fn insert(
        &mut self,
        domain: &str,
        owner_id: NodeId,
        kind: RecordKind,
        target: Option<String>,
        announced_ts: Timestamp,
    ) -> bool {
        if let Some(existing) = self.entries.get(domain) {
            if announced_ts >= existing.announced_ts {
                return false;
            }
        }

        self.evict_for_insert();

        let now = now_ms();
        self.entries.insert(
            domain.to_string(),
            CacheEntry {
                domain: domain.to_string(),
                owner_id,
                kind,
                target,
                resolved_at: now,
                expires_at: now + self.ttl.as_millis() as Timestamp,
                announced_ts,
            },
        );
        true
    }

    fn evict_for_insert(&mut self) {
        if self.entries.len() < self.capacity {
            return;
        }
        let now = now_ms();
        if let Some(expired_key) = self
            .entries
            .iter()
            .find(|(_, e)| e.expires_at < now)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&expired_key);
            return;
        }
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.resolved_at)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest_key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
