//! Delta sync (spec §4.2). For resources tracked as JSON objects, the
//! optimizer remembers the last full state it sent; subsequent updates are
//! sent as `{added, changed, removed}` only when that delta serializes to
//! under half the size of the full state, otherwise the sender falls back
//! to a full update.
//!
//! The spec's open question (§9) about the checksum is resolved here: we
//! commit to hashing the `serde_json::to_vec` of the value with its object
//! keys sorted (via `BTreeMap` round-trip), which is a deterministic
//! encoding regardless of the source map's iteration order, using a 32-bit
//! FNV-1a hash (not CRC32 — the spec leaves the exact algorithm
//! unspecified, and FNV-1a is simple enough to implement without pulling in
//! a CRC crate the rest of the workspace has no other use for).

use std::collections::BTreeMap;

use dashmap::DashMap;
use rednet_types::wire::ResourceDelta;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("no base state is known for resource '{0}'; full resync required")]
    MissingBase(String),
    #[error("checksum mismatch applying delta to resource '{0}'")]
    ChecksumMismatch(String),
}

/// Deterministic FNV-1a 32-bit hash over the sorted-key JSON encoding of
/// `value`.
pub fn checksum(value: &Value) -> u32 {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).expect("canonical JSON always serializes");
    fnv1a(&bytes)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).expect("map of values always serializes")
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET: u32 = 0x811c9dc5;
    const PRIME: u32 = 0x01000193;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub enum Update {
    Full(Value),
    Delta(ResourceDelta, u32),
}

/// Owns the per-resource "last known full state" table on the sending side.
#[derive(Default)]
pub struct DeltaSync {
    full_states: DashMap<String, Value>,
}

impl DeltaSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the update to send for `resource`'s new state, choosing a
    /// delta only when it is smaller than half the full encoding.
    pub fn prepare_update(&self, resource: &str, new_state: Value) -> Update {
        let update = match self.full_states.get(resource) {
            Some(old) => {
                let delta = diff(&old, &new_state);
                let full_len = serde_json::to_vec(&new_state).map(|v| v.len()).unwrap_or(usize::MAX);
                let delta_len = serde_json::to_vec(&delta).map(|v| v.len()).unwrap_or(usize::MAX);
                if delta_len < full_len / 2 {
                    Update::Delta(delta, checksum(&new_state))
                } else {
                    Update::Full(new_state.clone())
                }
            },
            None => Update::Full(new_state.clone()),
        };
        self.full_states.insert(resource.to_string(), new_state);
        update
    }
}

fn diff(old: &Value, new: &Value) -> ResourceDelta {
    let empty = serde_json::Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    let mut added = serde_json::Map::new();
    let mut changed = serde_json::Map::new();
    let mut removed = serde_json::Map::new();

    for (key, value) in new_map {
        match old_map.get(key) {
            None => {
                added.insert(key.clone(), value.clone());
            },
            Some(old_value) if old_value != value => {
                changed.insert(key.clone(), value.clone());
            },
            _ => {},
        }
    }
    for (key, value) in old_map {
        if !new_map.contains_key(key) {
            removed.insert(key.clone(), value.clone());
        }
    }

    ResourceDelta {
        added: Value::Object(added),
        changed: Value::Object(changed),
        removed: Value::Object(removed),
    }
}

/// Owns the per-resource "last known full state" table on the receiving
/// side, and applies incoming deltas against it.
#[derive(Default)]
pub struct DeltaReceiver {
    full_states: DashMap<String, Value>,
}

impl DeltaReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_full(&self, resource: &str, state: Value) {
        self.full_states.insert(resource.to_string(), state);
    }

    /// Apply a delta to the locally-known base state, verifying the
    /// checksum of the result. On success, the new full state replaces the
    /// stored base.
    pub fn apply_delta(
        &self,
        resource: &str,
        delta: &ResourceDelta,
        expected_checksum: u32,
    ) -> Result<Value, DeltaError> {
        let mut base = self
            .full_states
            .get(resource)
            .map(|v| v.clone())
            .ok_or_else(|| DeltaError::MissingBase(resource.to_string()))?;

        let base_map = base.as_object_mut().expect("resources are always objects");
        if let Some(added) = delta.added.as_object() {
            for (k, v) in added {
                base_map.insert(k.clone(), v.clone());
            }
        }
        if let Some(changed) = delta.changed.as_object() {
            for (k, v) in changed {
                base_map.insert(k.clone(), v.clone());
            }
        }
        if let Some(removed) = delta.removed.as_object() {
            for k in removed.keys() {
                base_map.remove(k);
            }
        }

        if checksum(&base) != expected_checksum {
            return Err(DeltaError::ChecksumMismatch(resource.to_string()));
        }

        self.full_states.insert(resource.to_string(), base.clone());
        Ok(base)
    }
}
