//! Per-peer trust levels and the blacklist they feed into (spec §4.4 "Trust
//! update"). Each node keeps its own local view; there is no global
//! consensus on trust, only on the dispute outcomes that adjust it.

use std::sync::Arc;

use dashmap::DashMap;
use rednet_types::{now_ms, NodeId, Timestamp};

#[derive(Clone)]
pub struct TrustStore {
    default_trust: f64,
    trust: Arc<DashMap<NodeId, f64>>,
    blacklist: Arc<DashMap<NodeId, Timestamp>>,
}

impl TrustStore {
    pub fn new(default_trust: f64) -> Self {
        Self {
            default_trust,
            trust: Arc::new(DashMap::new()),
            blacklist: Arc::new(DashMap::new()),
        }
    }

    pub fn trust_of(&self, node: NodeId) -> f64 {
        self.trust.get(&node).map(|e| *e).unwrap_or(self.default_trust)
    }

    /// `true` if `node`'s blacklist entry is still in effect at `now`.
    pub fn is_blacklisted(&self, node: NodeId, now: Timestamp) -> bool {
        match self.blacklist.get(&node) {
            Some(until) => *until > now,
            None => false,
        }
    }

    /// Lower `node`'s trust by `rate`, floored at zero. Returns the new
    /// value so the caller can decide whether to blacklist.
    pub fn decay(&self, node: NodeId, rate: f64) -> f64 {
        let mut entry = self.trust.entry(node).or_insert(self.default_trust);
        *entry = (*entry - rate).max(0.0);
        *entry
    }

    pub fn blacklist_for(&self, node: NodeId, duration_ms: u64) {
        self.blacklist.insert(node, now_ms() + duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_starts_at_default_trust() {
        let store = TrustStore::new(0.5);
        assert_eq!(store.trust_of(7), 0.5);
    }

    #[test]
    fn decay_floors_at_zero() {
        let store = TrustStore::new(0.1);
        assert_eq!(store.decay(1, 0.3), 0.0);
        assert_eq!(store.trust_of(1), 0.0);
    }

    #[test]
    fn blacklist_expires() {
        let store = TrustStore::new(0.5);
        store.blacklist_for(1, 0);
        assert!(!store.is_blacklisted(1, now_ms() + 1));
    }
}
