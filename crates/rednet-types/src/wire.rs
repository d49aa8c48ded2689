//! Wire message shapes (spec §6). These are the payloads carried over
//! Transport (C1); every one travels inside an [`Envelope`], which carries
//! the sender/timestamp fields every authenticity and freshness check
//! depends on.

use serde::{Deserialize, Serialize};

use crate::{NodeId, Timestamp};

/// How far into the future or past a timestamp may be and still be accepted.
/// Rejects far-future and stale envelopes (spec §6).
pub const ENVELOPE_AGE_WINDOW_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sender_id: NodeId,
    pub ts: Timestamp,
    pub message: Message,
}

impl Envelope {
    pub fn new(sender_id: NodeId, ts: Timestamp, message: Message) -> Self {
        Self {
            sender_id,
            ts,
            message,
        }
    }

    /// Reject envelopes whose timestamp falls outside the acceptable age
    /// window relative to `now`.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        let age = now.abs_diff(self.ts);
        age <= ENVELOPE_AGE_WINDOW_MS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    DnsQuery(DnsQuery),
    DnsResponse(DnsResponse),
    DnsRegister(DnsRegister),
    DnsUpdate(DnsUpdate),
    DisputeRaised(DisputeRaised),
    VoteRequest(VoteRequest),
    VoteResponse(VoteResponse),
    DisputeResolved(DisputeResolved),
    Ping(Ping),
    Pong(Pong),
    Batch(BatchMessage),
    Delta(DeltaMessage),
    Compressed(CompressedEnvelope),
    PageRequest(PageRequest),
    PageResponse(PageResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsQuery {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsResponse {
    pub domain: String,
    pub owner_id: NodeId,
    pub metadata: DnsResponseMetadata,
    pub ts: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsResponseMetadata {
    pub kind: DomainKind,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DomainKind {
    Computer,
    Alias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRegister {
    pub domain: String,
    pub target: Option<String>,
    pub owner_id: NodeId,
    pub ts: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsUpdate {
    pub domain: String,
    pub owner: NodeId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRaised {
    pub dispute_id: String,
    pub domain: String,
    pub claimant_id: NodeId,
    pub claimed_id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub dispute_id: String,
    pub domain: String,
    pub claimant: NodeId,
    pub claimed: NodeId,
    /// Evidence schema is deliberately open (spec §9 open questions); kept
    /// as an untyped JSON blob so voters can introspect whatever fields a
    /// claimant happened to provide (e.g. `ownershipProof`).
    pub evidence: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Vote {
    Claimant,
    Claimed,
    Abstain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub dispute_id: String,
    pub vote: Vote,
    pub voter: NodeId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisputeWinner {
    Claimant,
    Claimed,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeResolved {
    pub dispute_id: String,
    pub domain: String,
    pub winner: DisputeWinner,
    pub resolution: String,
    pub ts: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub nonce: u64,
    pub ts: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pong {
    pub nonce: u64,
    pub ts: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMessage {
    pub messages: Vec<Envelope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDelta {
    pub added: serde_json::Value,
    pub changed: serde_json::Value,
    pub removed: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaMessage {
    pub resource: String,
    pub delta: ResourceDelta,
    pub checksum: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedEnvelope {
    pub compressed: bool,
    pub data: Vec<u8>,
    pub original: usize,
}

/// A Content Handlers (C8) fetch against `<name>.comp<id>.rednet/<path>`,
/// sent to the resolved owner node over Transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub request_id: u64,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub request_id: u64,
    pub found: bool,
    pub content: Vec<u8>,
}
