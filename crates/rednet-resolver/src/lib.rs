//! DNS Resolver (C4): the dispute lifecycle, trust-weighted voting and
//! blacklisting spec §4.4 describes.

pub mod config;
pub mod dispute;
pub mod error;
pub mod trust;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rednet_net_optimizer::NetOptimizer;
use rednet_transport::Transport;
use rednet_types::lifecycle::WithStartAndShutdown;
use rednet_types::peers::PeerDirectory;
use rednet_types::wire::{
    DisputeRaised, DisputeResolved, DisputeWinner, DnsUpdate, Message, Vote, VoteRequest, VoteResponse,
};
use rednet_types::{now_ms, NodeId, Timestamp};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub use config::Config;
pub use dispute::{Dispute, DisputeStatus};
pub use error::ResolverError;
pub use trust::TrustStore;

const RESOLVER_PROTOCOL: &str = "resolver";
const HOUR_MS: u64 = 3_600_000;

pub struct Resolver {
    self_id: NodeId,
    config: Config,
    transport: Transport,
    optimizer: Arc<NetOptimizer>,
    peers: PeerDirectory,
    trust: TrustStore,
    disputes: Arc<DashMap<String, Mutex<Dispute>>>,
    rate_limit: Arc<DashMap<NodeId, Mutex<VecDeque<Timestamp>>>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Resolver {
    pub fn new(self_id: NodeId, config: Config, transport: Transport, optimizer: Arc<NetOptimizer>, peers: PeerDirectory) -> Self {
        let trust = TrustStore::new(config.default_trust);
        Self {
            self_id,
            config,
            transport,
            optimizer,
            peers,
            trust,
            disputes: Arc::new(DashMap::new()),
            rate_limit: Arc::new(DashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    /// Raise a dispute against `domain`'s current owner (spec §4.4
    /// `raiseDispute`). Rejected raises are never stored.
    pub async fn raise_dispute(
        &self,
        domain: &str,
        claimant: NodeId,
        claimed: NodeId,
        evidence: Value,
    ) -> Result<String, ResolverError> {
        let now = now_ms();

        if self.trust.is_blacklisted(claimant, now) {
            return Err(ResolverError::Blacklisted(claimant));
        }

        let active_on_domain = self
            .disputes
            .iter()
            .any(|entry| entry.value().lock().unwrap().domain == domain && entry.value().lock().unwrap().is_active());
        if active_on_domain {
            return Err(ResolverError::ActiveDisputeExists(domain.to_string()));
        }

        {
            let mut recent = self.rate_limit.entry(claimant).or_default().lock().unwrap().clone();
            recent.retain(|ts| now.saturating_sub(*ts) < HOUR_MS);
            if recent.len() as u32 >= self.config.max_disputes_per_hour {
                return Err(ResolverError::RateLimited(claimant));
            }
            recent.push_back(now);
            *self.rate_limit.entry(claimant).or_default().lock().unwrap() = recent;
        }

        let id = format!("dispute-{}-{:x}", self.self_id, rand::random::<u64>());
        let dispute = Dispute::new(id.clone(), domain.to_string(), claimant, claimed, evidence.clone(), now);
        self.disputes.insert(id.clone(), Mutex::new(dispute));

        let message = Message::VoteRequest(VoteRequest {
            dispute_id: id.clone(),
            domain: domain.to_string(),
            claimant,
            claimed,
            evidence,
        });
        if let Err(err) = self.optimizer.broadcast(RESOLVER_PROTOCOL, message, None).await {
            warn!(dispute = %id, %err, "failed to broadcast vote request");
        }
        let raised = Message::DisputeRaised(DisputeRaised {
            dispute_id: id.clone(),
            domain: domain.to_string(),
            claimant_id: claimant,
            claimed_id: claimed,
        });
        let _ = self.optimizer.broadcast(RESOLVER_PROTOCOL, raised, None).await;

        spawn_tally_timer(
            id.clone(),
            self.config.voting_timeout,
            self.disputes.clone(),
            self.config.clone(),
            self.trust.clone(),
            self.peers.clone(),
            self.optimizer.clone(),
            self.self_id,
        );

        Ok(id)
    }

    pub fn dispute(&self, id: &str) -> Option<Dispute> {
        self.disputes.get(id).map(|entry| entry.lock().unwrap().clone())
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_tally_timer(
    dispute_id: String,
    voting_timeout: Duration,
    disputes: Arc<DashMap<String, Mutex<Dispute>>>,
    config: Config,
    trust: TrustStore,
    peers: PeerDirectory,
    optimizer: Arc<NetOptimizer>,
    self_id: NodeId,
) {
    tokio::spawn(async move {
        tokio::time::sleep(voting_timeout).await;
        tally(&dispute_id, &disputes, &config, &trust, &peers, &optimizer, self_id).await;
    });
}

#[allow(clippy::too_many_arguments)]
async fn tally(
    dispute_id: &str,
    disputes: &Arc<DashMap<String, Mutex<Dispute>>>,
    config: &Config,
    trust: &TrustStore,
    peers: &PeerDirectory,
    optimizer: &Arc<NetOptimizer>,
    self_id: NodeId,
) {
    let Some(entry) = disputes.get(dispute_id) else { return };

    // Eligibility (spec §4.4 "Voting"): only votes from peers known as
    // server kind with trust above the floor count toward the tally.
    let (domain, claimant, claimed, eligible_votes) = {
        let mut dispute = entry.lock().unwrap();
        if !dispute.is_active() {
            return;
        }
        let now = now_ms();
        if now.saturating_sub(dispute.created_at) > config.dispute_expiry.as_millis() as Timestamp {
            dispute.status = DisputeStatus::Expired;
            return;
        }
        dispute.status = DisputeStatus::Tallying;
        let eligible: Vec<VoteResponse> = dispute
            .votes
            .iter()
            .cloned()
            .filter(|v| {
                peers.is_server(v.voter)
                    && !trust.is_blacklisted(v.voter, now)
                    && trust.trust_of(v.voter) > config.min_trust_level
            })
            .collect();
        (dispute.domain.clone(), dispute.claimant, dispute.claimed, eligible)
    };

    if eligible_votes.len() < config.min_voters as usize {
        let mut dispute = entry.lock().unwrap();
        dispute.status = DisputeStatus::InsufficientVotes;
        dispute.winner = Some(DisputeWinner::None);
        drop(dispute);
        finalize(dispute_id, &domain, DisputeWinner::None, "insufficient votes", optimizer, self_id).await;
        return;
    }

    let result = dispute::tally_votes(&eligible_votes, |voter| trust.trust_of(voter), config.majority_threshold);

    let winner = result.winner.unwrap_or(DisputeWinner::None);
    let loser = match winner {
        DisputeWinner::Claimant => Some(claimed),
        DisputeWinner::Claimed => Some(claimant),
        DisputeWinner::None => None,
    };
    if let Some(loser) = loser {
        let new_trust = trust.decay(loser, config.trust_decay_rate);
        if new_trust <= config.min_trust_level {
            trust.blacklist_for(loser, config.blacklist_duration.as_millis() as u64);
            info!(node = loser, "peer blacklisted after losing dispute");
        }
    }

    {
        let mut dispute = entry.lock().unwrap();
        dispute.status = DisputeStatus::Resolved;
        dispute.winner = Some(winner);
    }

    let resolution = match winner {
        DisputeWinner::Claimant => "claimant's evidence prevailed",
        DisputeWinner::Claimed => "status quo upheld",
        DisputeWinner::None => "no decisive majority",
    };
    finalize(dispute_id, &domain, winner, resolution, optimizer, self_id).await;

    if winner == DisputeWinner::Claimant {
        let update = Message::DnsUpdate(DnsUpdate {
            domain: domain.clone(),
            owner: claimant,
            reason: "dispute resolved in claimant's favor".to_string(),
        });
        let _ = optimizer.broadcast(RESOLVER_PROTOCOL, update, None).await;
    }
}

async fn finalize(
    dispute_id: &str,
    domain: &str,
    winner: DisputeWinner,
    resolution: &str,
    optimizer: &Arc<NetOptimizer>,
    self_id: NodeId,
) {
    let message = Message::DisputeResolved(DisputeResolved {
        dispute_id: dispute_id.to_string(),
        domain: domain.to_string(),
        winner,
        resolution: resolution.to_string(),
        ts: now_ms(),
    });
    if let Err(err) = optimizer.broadcast(RESOLVER_PROTOCOL, message, None).await {
        warn!(dispute = dispute_id, node = self_id, %err, "failed to broadcast dispute resolution");
    }
}

fn cast_vote(evidence: &Value) -> Vote {
    if evidence.get("ownershipProof").is_some() {
        Vote::Claimant
    } else {
        Vote::Claimed
    }
}

#[async_trait]
impl WithStartAndShutdown for Resolver {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        if self.is_running() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let transport = self.transport.clone();
        let optimizer = self.optimizer.clone();
        let peers = self.peers.clone();
        let disputes = self.disputes.clone();
        let self_id = self.self_id;
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let mut sub = transport.subscribe(RESOLVER_PROTOCOL);
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    delivery = sub.receive(Duration::from_millis(500)) => {
                        let Some((sender_id, bytes)) = delivery else { continue };
                        let Ok(messages) = NetOptimizer::decode(&bytes) else { continue };
                        for message in messages {
                            handle_message(self_id, sender_id, message, &optimizer, &peers, &disputes).await;
                        }
                    },
                }
            }
            running.store(false, Ordering::SeqCst);
        });
        tokio::task::yield_now().await;
    }

    async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn handle_message(
    self_id: NodeId,
    sender_id: NodeId,
    message: Message,
    optimizer: &Arc<NetOptimizer>,
    _peers: &PeerDirectory,
    disputes: &Arc<DashMap<String, Mutex<Dispute>>>,
) {
    match message {
        Message::VoteRequest(request) => {
            let vote = cast_vote(&request.evidence);
            let response = Message::VoteResponse(VoteResponse {
                dispute_id: request.dispute_id,
                vote,
                voter: self_id,
            });
            if let Err(err) = optimizer.send(sender_id, RESOLVER_PROTOCOL, response, true, None).await {
                warn!(%err, "failed to send vote response");
            }
        },
        Message::VoteResponse(response) => {
            if let Some(entry) = disputes.get(&response.dispute_id) {
                entry.lock().unwrap().record_vote(response);
            }
        },
        Message::DisputeRaised(raised) => {
            debug!(domain = %raised.domain, dispute = %raised.dispute_id, "observed dispute raised by peer");
        },
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rednet_transport::Network;
    use rednet_types::peers::PeerKind;
    use serde_json::json;

    use super::*;

    fn optimizer(net: &Network, node: NodeId) -> Arc<NetOptimizer> {
        Arc::new(NetOptimizer::new(net.transport(node), rednet_net_optimizer::Config::default()))
    }

    #[tokio::test]
    async fn raises_and_stores_a_dispute() {
        let net = Network::new();
        let resolver = Resolver::new(1, Config::default(), net.transport(1), optimizer(&net, 1), PeerDirectory::new());

        let id = resolver.raise_dispute("shop", 1, 2, json!({})).await.unwrap();
        let dispute = resolver.dispute(&id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::Voting);
    }

    #[tokio::test]
    async fn rejects_a_second_active_dispute_on_the_same_domain() {
        let net = Network::new();
        let resolver = Resolver::new(1, Config::default(), net.transport(1), optimizer(&net, 1), PeerDirectory::new());
        resolver.raise_dispute("shop", 1, 2, json!({})).await.unwrap();

        let result = resolver.raise_dispute("shop", 3, 2, json!({})).await;
        assert!(matches!(result, Err(ResolverError::ActiveDisputeExists(_))));
    }

    #[tokio::test]
    async fn rate_limits_a_claimant_after_the_hourly_cap() {
        let net = Network::new();
        let mut config = Config::default();
        config.max_disputes_per_hour = 1;
        let resolver = Resolver::new(1, config, net.transport(1), optimizer(&net, 1), PeerDirectory::new());

        resolver.raise_dispute("a", 9, 2, json!({})).await.unwrap();
        let result = resolver.raise_dispute("b", 9, 2, json!({})).await;
        assert!(matches!(result, Err(ResolverError::RateLimited(9))));
    }

    #[tokio::test]
    async fn tally_resolves_in_favor_of_claimant_with_trusted_supermajority() {
        let net = Network::new();
        let peers = PeerDirectory::new();
        for voter in [10, 11, 12] {
            peers.set_kind(voter, PeerKind::Server);
        }

        let mut config = Config::default();
        config.voting_timeout = Duration::from_millis(30);
        config.min_voters = 3;

        let resolver = Resolver::new(1, config, net.transport(1), optimizer(&net, 1), peers.clone());
        let id = resolver
            .raise_dispute("shop", 5, 6, json!({"ownershipProof": "ts:100"}))
            .await
            .unwrap();

        for voter in [10, 11, 12] {
            resolver
                .trust_store()
                .decay(voter, -0.4); // bump trust above default for this test's weighting
        }

        handle_message(
            1,
            10,
            Message::VoteResponse(VoteResponse {
                dispute_id: id.clone(),
                vote: Vote::Claimant,
                voter: 10,
            }),
            &resolver.optimizer.clone(),
            &PeerDirectory::new(),
            &resolver.disputes,
        )
        .await;
        handle_message(
            1,
            11,
            Message::VoteResponse(VoteResponse {
                dispute_id: id.clone(),
                vote: Vote::Claimant,
                voter: 11,
            }),
            &resolver.optimizer.clone(),
            &PeerDirectory::new(),
            &resolver.disputes,
        )
        .await;
        handle_message(
            1,
            12,
            Message::VoteResponse(VoteResponse {
                dispute_id: id.clone(),
                vote: Vote::Claimed,
                voter: 12,
            }),
            &resolver.optimizer.clone(),
            &PeerDirectory::new(),
            &resolver.disputes,
        )
        .await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        let dispute = resolver.dispute(&id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::Resolved);
        assert_eq!(dispute.winner, Some(DisputeWinner::Claimant));
    }

    #[tokio::test]
    async fn a_vote_arriving_after_resolution_is_ignored() {
        let net = Network::new();
        let peers = PeerDirectory::new();
        for voter in [10, 11, 12] {
            peers.set_kind(voter, PeerKind::Server);
        }

        let mut config = Config::default();
        config.voting_timeout = Duration::from_millis(30);
        config.min_voters = 2;

        let resolver = Resolver::new(1, config, net.transport(1), optimizer(&net, 1), peers.clone());
        let id = resolver
            .raise_dispute("shop", 5, 6, json!({"ownershipProof": "ts:100"}))
            .await
            .unwrap();

        handle_message(
            1,
            10,
            Message::VoteResponse(VoteResponse {
                dispute_id: id.clone(),
                vote: Vote::Claimant,
                voter: 10,
            }),
            &resolver.optimizer.clone(),
            &PeerDirectory::new(),
            &resolver.disputes,
        )
        .await;
        handle_message(
            1,
            11,
            Message::VoteResponse(VoteResponse {
                dispute_id: id.clone(),
                vote: Vote::Claimant,
                voter: 11,
            }),
            &resolver.optimizer.clone(),
            &PeerDirectory::new(),
            &resolver.disputes,
        )
        .await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        let before = resolver.dispute(&id).unwrap();
        assert_eq!(before.status, DisputeStatus::Resolved);
        let votes_before = before.votes.len();

        // A duplicate/late vote delivered after tally/resolution must not
        // change the stored vote list.
        handle_message(
            1,
            12,
            Message::VoteResponse(VoteResponse {
                dispute_id: id.clone(),
                vote: Vote::Claimed,
                voter: 12,
            }),
            &resolver.optimizer.clone(),
            &PeerDirectory::new(),
            &resolver.disputes,
        )
        .await;

        let after = resolver.dispute(&id).unwrap();
        assert_eq!(after.votes.len(), votes_before);
        assert_eq!(after.status, DisputeStatus::Resolved);
    }
}
