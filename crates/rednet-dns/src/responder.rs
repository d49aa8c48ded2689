//! The background task that answers `DNS_QUERY` broadcasts from this node's
//! [`Registry`] and folds observed `DNS_REGISTER` announcements into the
//! shared [`DnsCache`] (spec §4.3 steps 1-4).
//!
//! Authenticity (spec §4.3, §9 open question on "how is authenticity
//! verified"): we accept a `DNS_REGISTER` if it is self-attested (the sender
//! claims ownership of the domain it announces) or relayed by a node the
//! [`PeerDirectory`] marks as a server. Anything else is dropped silently,
//! matching the DNS cache's "Inauthentic" rejection path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use rednet_net_optimizer::NetOptimizer;
use rednet_transport::Transport;
use rednet_types::peers::PeerDirectory;
use rednet_types::wire::{DnsResponse, Message, DomainKind};
use rednet_types::{now_ms, wire::ENVELOPE_AGE_WINDOW_MS, NodeId};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace};

use crate::cache::DnsCache;
use crate::registry::{RecordKind, Registry};

const DNS_PROTOCOL: &str = "dns";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub type ResponseWaiters = Arc<DashMap<String, mpsc::UnboundedSender<(NodeId, DnsResponse)>>>;

impl From<DomainKind> for RecordKind {
    fn from(kind: DomainKind) -> Self {
        match kind {
            DomainKind::Computer => RecordKind::Computer,
            DomainKind::Alias => RecordKind::Alias,
        }
    }
}

impl From<RecordKind> for DomainKind {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Computer => DomainKind::Computer,
            RecordKind::Alias => DomainKind::Alias,
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn(
    self_id: NodeId,
    transport: Transport,
    optimizer: Arc<NetOptimizer>,
    registry: Arc<Mutex<Registry>>,
    cache: Arc<Mutex<DnsCache>>,
    peers: PeerDirectory,
    waiters: ResponseWaiters,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    tokio::spawn(async move {
        let mut sub = transport.subscribe(DNS_PROTOCOL);
        running.store(true, Ordering::SeqCst);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                delivery = sub.receive(POLL_INTERVAL) => {
                    let Some((sender_id, bytes)) = delivery else { continue };
                    let Ok(messages) = NetOptimizer::decode(&bytes) else { continue };
                    for message in messages {
                        handle_message(
                            self_id, sender_id, message, &transport, &optimizer, &registry, &cache, &peers,
                            &waiters,
                        );
                    }
                },
            }
        }

        running.store(false, Ordering::SeqCst);
    });
}

#[allow(clippy::too_many_arguments)]
fn handle_message(
    self_id: NodeId,
    sender_id: NodeId,
    message: Message,
    transport: &Transport,
    optimizer: &Arc<NetOptimizer>,
    registry: &Arc<Mutex<Registry>>,
    cache: &Arc<Mutex<DnsCache>>,
    peers: &PeerDirectory,
    waiters: &ResponseWaiters,
) {
    match message {
        Message::DnsQuery(query) => {
            let record = registry.lock().unwrap().get(&query.domain).cloned();
            if let Some(record) = record {
                let response = DnsResponse {
                    domain: record.domain,
                    owner_id: self_id,
                    metadata: rednet_types::wire::DnsResponseMetadata {
                        kind: record.kind.into(),
                        target: record.target,
                    },
                    ts: record.registered_at,
                };
                let optimizer = optimizer.clone();
                let transport_id = transport.node_id();
                tokio::spawn(async move {
                    let _ = optimizer
                        .send(sender_id, DNS_PROTOCOL, Message::DnsResponse(response), true, None)
                        .await;
                    trace!(node = transport_id, dest = sender_id, "answered dns query");
                });
            }
        },
        Message::DnsRegister(register) => {
            let authentic = sender_id == register.owner_id || peers.is_server(sender_id);
            let fresh = now_ms().abs_diff(register.ts) <= ENVELOPE_AGE_WINDOW_MS;
            if !authentic || !fresh {
                debug!(domain = %register.domain, authentic, fresh, "dropped inauthentic dns_register");
                return;
            }
            let kind = if register.target.is_some() {
                RecordKind::Alias
            } else {
                RecordKind::Computer
            };
            cache
                .lock()
                .unwrap()
                .insert(&register.domain, register.owner_id, kind, register.target, register.ts);
        },
        Message::DnsResponse(response) => {
            if let Some(tx) = waiters.get(&response.domain) {
                let _ = tx.send((sender_id, response));
            }
        },
        _ => {},
    }
}
