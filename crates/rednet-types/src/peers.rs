//! A shared view of "what kind of peer is node X" — used by DNS Core to
//! decide whether an unsigned broadcast claim is authentic (spec §4.3) and
//! by the Resolver to decide who is eligible to vote (spec §4.4). Neither
//! component owns this table exclusively; it's filled in by whatever
//! discovery mechanism the embedding host uses (out of scope here), so this
//! is deliberately just a small shared lookup, not a full component.

use std::sync::Arc;

use dashmap::DashMap;

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    Server,
    Client,
}

#[derive(Clone, Default)]
pub struct PeerDirectory {
    kinds: Arc<DashMap<NodeId, PeerKind>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_kind(&self, node_id: NodeId, kind: PeerKind) {
        self.kinds.insert(node_id, kind);
    }

    pub fn kind_of(&self, node_id: NodeId) -> Option<PeerKind> {
        self.kinds.get(&node_id).map(|e| *e)
    }

    pub fn is_server(&self, node_id: NodeId) -> bool {
        matches!(self.kind_of(node_id), Some(PeerKind::Server))
    }
}
