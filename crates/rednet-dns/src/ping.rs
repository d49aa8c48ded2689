//! Ping/pong round trip used to verify a computer domain's target node is
//! reachable before trusting a cache hit (spec §4.3 step 2).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rednet_transport::Transport;
use rednet_types::wire::{Ping, Pong};
use rednet_types::{now_ms, NodeId};
use tokio::sync::oneshot;

const PING_REQUEST_PROTOCOL: &str = "ping-request";
const PING_RESPONSE_PROTOCOL: &str = "ping-response";
const SUBSCRIBE_POLL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct PingService {
    transport: Transport,
    pending: Arc<DashMap<u64, oneshot::Sender<()>>>,
}

impl PingService {
    /// Spawn the responder (answers other nodes' pings) and the dispatcher
    /// (matches incoming pongs to our own in-flight pings).
    pub fn spawn(transport: Transport) -> Self {
        let pending: Arc<DashMap<u64, oneshot::Sender<()>>> = Arc::new(DashMap::new());

        {
            let transport = transport.clone();
            tokio::spawn(async move {
                let mut sub = transport.subscribe(PING_REQUEST_PROTOCOL);
                loop {
                    if let Some((sender, bytes)) = sub.receive(SUBSCRIBE_POLL).await {
                        if let Ok(ping) = bincode::deserialize::<Ping>(&bytes) {
                            let pong = Pong {
                                nonce: ping.nonce,
                                ts: now_ms(),
                            };
                            if let Ok(bytes) = bincode::serialize(&pong) {
                                transport.send(sender, PING_RESPONSE_PROTOCOL, bytes);
                            }
                        }
                    }
                }
            });
        }

        {
            let pending = pending.clone();
            let transport = transport.clone();
            tokio::spawn(async move {
                let mut sub = transport.subscribe(PING_RESPONSE_PROTOCOL);
                loop {
                    if let Some((_, bytes)) = sub.receive(SUBSCRIBE_POLL).await {
                        if let Ok(pong) = bincode::deserialize::<Pong>(&bytes) {
                            if let Some((_, tx)) = pending.remove(&pong.nonce) {
                                let _ = tx.send(());
                            }
                        }
                    }
                }
            });
        }

        Self { transport, pending }
    }

    /// Ping `target`, returning `true` if a pong arrived within `timeout`.
    pub async fn ping(&self, target: NodeId, timeout: Duration) -> bool {
        let nonce: u64 = rand::random();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(nonce, tx);

        let Ok(bytes) = bincode::serialize(&Ping {
            nonce,
            ts: now_ms(),
        }) else {
            self.pending.remove(&nonce);
            return false;
        };
        self.transport.send(target, PING_REQUEST_PROTOCOL, bytes);

        let result = tokio::time::timeout(timeout, rx).await;
        self.pending.remove(&nonce);
        matches!(result, Ok(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use rednet_transport::Network;

    use super::*;

    #[tokio::test]
    async fn ping_succeeds_against_a_live_responder() {
        let net = Network::new();
        let _responder = PingService::spawn(net.transport(2));
        let pinger = PingService::spawn(net.transport(1));

        assert!(pinger.ping(2, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn ping_times_out_against_an_unreachable_node() {
        let net = Network::new();
        let pinger = PingService::spawn(net.transport(1));
        assert!(!pinger.ping(99, Duration::from_millis(50)).await);
    }
}
