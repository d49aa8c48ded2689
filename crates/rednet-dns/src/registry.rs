//! The local registry (spec §4.3, §3 "Registry record"). Exclusively owned
//! and mutated by this node; other nodes learn about it only via broadcast
//! `DNS_REGISTER` announcements and the responder answering `DNS_QUERY`.

use std::collections::HashMap;

use rednet_types::domain::{self, ParsedDomain};
use rednet_types::{now_ms, NodeId, Timestamp};

use crate::error::DnsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Computer,
    Alias,
}

#[derive(Debug, Clone)]
pub struct RegistryRecord {
    pub domain: String,
    pub kind: RecordKind,
    pub owner_id: NodeId,
    pub target: Option<String>,
    pub registered_at: Timestamp,
}

pub struct Registry {
    self_id: NodeId,
    records: HashMap<String, RegistryRecord>,
}

impl Registry {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            records: HashMap::new(),
        }
    }

    pub fn get(&self, domain: &str) -> Option<&RegistryRecord> {
        self.records.get(domain)
    }

    /// Register `domain` (an alias requires `target`, a computer domain
    /// must not have one). Returns the stored record; a repeated call with
    /// identical arguments on the owning node is a no-op that returns the
    /// existing record (spec §8 idempotence law).
    pub fn register(
        &mut self,
        domain: &str,
        target: Option<&str>,
        is_alias_conflicting: impl FnOnce(&str) -> bool,
    ) -> Result<RegistryRecord, DnsError> {
        let parsed = domain::parse(domain)?;
        let canonical = parsed.canonical();

        match parsed {
            ParsedDomain::Computer { id, .. } => {
                if id != self.self_id {
                    return Err(DnsError::NotOwner(canonical));
                }
                if let Some(existing) = self.records.get(&canonical) {
                    if existing.owner_id == self.self_id && existing.target.is_none() {
                        return Ok(existing.clone());
                    }
                }
                let record = RegistryRecord {
                    domain: canonical.clone(),
                    kind: RecordKind::Computer,
                    owner_id: self.self_id,
                    target: None,
                    registered_at: now_ms(),
                };
                self.records.insert(canonical, record.clone());
                Ok(record)
            },
            ParsedDomain::Alias { .. } => {
                let target = target.ok_or(DnsError::InvalidTarget)?;
                let parsed_target = domain::parse(target)?;
                let ParsedDomain::Computer { id: target_id, .. } = parsed_target else {
                    return Err(DnsError::InvalidTarget);
                };
                if target_id != self.self_id {
                    return Err(DnsError::InvalidTarget);
                }

                if let Some(existing) = self.records.get(&canonical) {
                    if existing.owner_id == self.self_id
                        && existing.target.as_deref() == Some(parsed_target.canonical().as_str())
                    {
                        return Ok(existing.clone());
                    }
                    return Err(DnsError::AlreadyRegistered(canonical));
                }
                if is_alias_conflicting(&canonical) {
                    return Err(DnsError::AlreadyRegistered(canonical));
                }

                let record = RegistryRecord {
                    domain: canonical.clone(),
                    kind: RecordKind::Alias,
                    owner_id: self.self_id,
                    target: Some(parsed_target.canonical()),
                    registered_at: now_ms(),
                };
                self.records.insert(canonical, record.clone());
                Ok(record)
            },
        }
    }
}
