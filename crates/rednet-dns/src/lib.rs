//! DNS Core (C3): domain parsing, the local registry, broadcast-based
//! resolution and the shared cache (spec §4.3).

pub mod cache;
pub mod config;
pub mod error;
pub mod ping;
pub mod registry;
mod responder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rednet_net_optimizer::NetOptimizer;
use rednet_transport::Transport;
use rednet_types::domain::{self, ParsedDomain};
use rednet_types::lifecycle::WithStartAndShutdown;
use rednet_types::peers::PeerDirectory;
use rednet_types::wire::{DnsQuery, DnsRegister, DnsResponse, DomainKind, Message};
use rednet_types::{now_ms, NodeId};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

pub use cache::{CacheEntry, DnsCache};
pub use config::Config;
pub use error::DnsError;
pub use ping::PingService;
pub use registry::{RecordKind, Registry, RegistryRecord};

const DNS_PROTOCOL: &str = "dns";

/// The resolved owner of a domain, as returned by [`DnsCore::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub domain: String,
    pub owner_id: NodeId,
    pub kind: RecordKind,
    pub target: Option<String>,
}

pub struct DnsCore {
    self_id: NodeId,
    config: Config,
    transport: Transport,
    optimizer: Arc<NetOptimizer>,
    registry: Arc<Mutex<Registry>>,
    cache: Arc<Mutex<DnsCache>>,
    peers: PeerDirectory,
    pinger: PingService,
    waiters: responder::ResponseWaiters,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl DnsCore {
    pub fn new(self_id: NodeId, config: Config, transport: Transport, peers: PeerDirectory) -> Self {
        let optimizer_config = rednet_net_optimizer::Config::default();
        let optimizer = Arc::new(NetOptimizer::new(transport.clone(), optimizer_config));
        let pinger = PingService::spawn(transport.clone());
        let cache = DnsCache::new(config.cache_timeout, config.max_cache_entries);

        Self {
            registry: Arc::new(Mutex::new(Registry::new(self_id))),
            cache: Arc::new(Mutex::new(cache)),
            waiters: Arc::new(DashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            self_id,
            config,
            transport,
            optimizer,
            peers,
            pinger,
        }
    }

    /// Register a domain owned by this node (computer domain) or an alias
    /// pointing at one (spec §4.3 step "Registration").
    pub async fn register(&self, domain: &str, target: Option<&str>) -> Result<RegistryRecord, DnsError> {
        let cache = self.cache.clone();
        let record = {
            let mut registry = self.registry.lock().unwrap();
            registry.register(domain, target, |canonical| {
                cache
                    .lock()
                    .unwrap()
                    .get(canonical)
                    .map(|entry| entry.owner_id != self.self_id)
                    .unwrap_or(false)
            })?
        };

        let ts = now_ms();
        self.cache.lock().unwrap().insert(
            &record.domain,
            record.owner_id,
            record.kind,
            record.target.clone(),
            ts,
        );

        let message = Message::DnsRegister(DnsRegister {
            domain: record.domain.clone(),
            target: record.target.clone(),
            owner_id: record.owner_id,
            ts,
        });
        if let Err(err) = self.optimizer.broadcast(DNS_PROTOCOL, message, None).await {
            warn!(domain = %record.domain, %err, "failed to broadcast dns registration");
        }

        Ok(record)
    }

    /// Resolve `domain` (spec §4.3 steps 1-4): cache lookup with reachability
    /// verification, falling back to a broadcast query with retries.
    pub async fn lookup(&self, domain: &str) -> Result<Resolution, DnsError> {
        let parsed = domain::parse(domain)?;
        let canonical = parsed.canonical();

        if let Some(entry) = self.cache.lock().unwrap().get(&canonical) {
            let reachable = if matches!(parsed, ParsedDomain::Computer { .. }) {
                self.pinger.ping(entry.owner_id, self.config.verification_timeout).await
            } else {
                true
            };
            if reachable {
                return Ok(Resolution {
                    domain: entry.domain,
                    owner_id: entry.owner_id,
                    kind: entry.kind,
                    target: entry.target,
                });
            }
            debug!(domain = %canonical, "cached owner unreachable; re-resolving");
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.waiters.insert(canonical.clone(), tx);
        let _guard = WaiterGuard {
            waiters: &self.waiters,
            domain: &canonical,
        };

        for attempt in 0..=self.config.max_retries {
            let message = Message::DnsQuery(DnsQuery {
                domain: canonical.clone(),
            });
            if let Err(err) = self.optimizer.broadcast(DNS_PROTOCOL, message, None).await {
                warn!(domain = %canonical, %err, "failed to broadcast dns query");
            }

            let deadline = tokio::time::Instant::now() + self.config.query_timeout;
            let mut responses: Vec<(NodeId, DnsResponse)> = Vec::new();
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, rx.recv()).await {
                    Ok(Some((sender_id, response))) => {
                        if self.is_authentic(sender_id, &response) {
                            responses.push((sender_id, response));
                        }
                    },
                    _ => break,
                }
            }

            if let Some((_, winner)) = responses.into_iter().min_by_key(|(_, r)| r.ts) {
                let kind: RecordKind = winner.metadata.kind.into();
                self.cache
                    .lock()
                    .unwrap()
                    .insert(&winner.domain, winner.owner_id, kind, winner.metadata.target.clone(), winner.ts);
                return Ok(Resolution {
                    domain: winner.domain,
                    owner_id: winner.owner_id,
                    kind,
                    target: winner.metadata.target,
                });
            }

            debug!(domain = %canonical, attempt, "no authentic dns response yet");
        }

        Err(DnsError::ResolutionTimeout(canonical))
    }

    fn is_authentic(&self, sender_id: NodeId, response: &DnsResponse) -> bool {
        sender_id == response.owner_id || self.peers.is_server(sender_id)
    }

    /// Whether `kind`'s wire representation round-trips unchanged; exposed
    /// for callers that need to render a [`DomainKind`] without depending on
    /// this crate's internal [`RecordKind`].
    pub fn wire_kind(kind: RecordKind) -> DomainKind {
        kind.into()
    }
}

struct WaiterGuard<'a> {
    waiters: &'a responder::ResponseWaiters,
    domain: &'a str,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.waiters.remove(self.domain);
    }
}

#[async_trait]
impl WithStartAndShutdown for DnsCore {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        if self.is_running() {
            return;
        }
        responder::spawn(
            self.self_id,
            self.transport.clone(),
            self.optimizer.clone(),
            self.registry.clone(),
            self.cache.clone(),
            self.peers.clone(),
            self.waiters.clone(),
            self.running.clone(),
            self.shutdown.clone(),
        );
        // Give the responder task a tick to subscribe before callers start
        // broadcasting queries that expect it to already be listening.
        tokio::task::yield_now().await;
    }

    async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rednet_transport::Network;

    use super::*;

    #[tokio::test]
    async fn registers_and_resolves_own_computer_domain_locally() {
        let net = Network::new();
        let core = DnsCore::new(1, Config::default(), net.transport(1), PeerDirectory::new());
        core.register("blog.comp1.rednet", None).await.unwrap();

        let resolution = core.lookup("blog.comp1.rednet").await.unwrap();
        assert_eq!(resolution.owner_id, 1);
        assert_eq!(resolution.kind, RecordKind::Computer);
    }

    #[tokio::test]
    async fn resolves_domain_registered_by_a_peer_over_broadcast() {
        let net = Network::new();
        let peers = PeerDirectory::new();
        peers.set_kind(2, rednet_types::peers::PeerKind::Server);

        let mut config = Config::default();
        config.query_timeout = Duration::from_millis(200);

        let owner = DnsCore::new(2, config.clone(), net.transport(2), peers.clone());
        owner.start().await;
        owner.register("shop.comp2.rednet", None).await.unwrap();

        let resolver = DnsCore::new(1, config, net.transport(1), peers);
        resolver.start().await;

        let resolution = resolver.lookup("shop.comp2.rednet").await.unwrap();
        assert_eq!(resolution.owner_id, 2);
    }

    #[tokio::test]
    async fn lookup_of_unknown_domain_times_out() {
        let net = Network::new();
        let mut config = Config::default();
        config.query_timeout = Duration::from_millis(50);
        config.max_retries = 0;

        let core = DnsCore::new(1, config, net.transport(1), PeerDirectory::new());
        core.start().await;

        let result = core.lookup("nothing.comp9.rednet").await;
        assert!(matches!(result, Err(DnsError::ResolutionTimeout(_))));
    }
}
