//! Net Optimizer (C2): batching, deduplication, compression and delta-sync
//! layered on top of [`rednet_transport::Transport`] (spec §4.2).

pub mod batch;
pub mod compression;
pub mod config;
pub mod dedupe;
pub mod delta;

use std::sync::Arc;

use dashmap::DashMap;
use rednet_transport::Transport;
use rednet_types::wire::{CompressedEnvelope, Message};
use rednet_types::{now_ms, NodeId};
use thiserror::Error;
use tracing::{debug, warn};

pub use config::Config;
pub use dedupe::RequestKey;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("failed to serialize message: {0}")]
    Serialize(String),
    #[error("failed to deserialize message: {0}")]
    Deserialize(String),
}

pub struct NetOptimizer {
    transport: Transport,
    config: Config,
    dedupe: dedupe::Dedupe,
    queues: DashMap<(NodeId, String), Arc<batch::BatchQueue>>,
}

impl NetOptimizer {
    pub fn new(transport: Transport, config: Config) -> Self {
        let dedupe = dedupe::Dedupe::new(config.dedupe_window, config.max_dedupe_cache);
        Self {
            transport,
            config,
            dedupe,
            queues: DashMap::new(),
        }
    }

    fn queue_for(&self, dest: NodeId, protocol: &str) -> Arc<batch::BatchQueue> {
        self.queues
            .entry((dest, protocol.to_string()))
            .or_insert_with(|| {
                Arc::new(batch::BatchQueue::new(
                    self.config.batch_size,
                    self.config.max_batch_size,
                    self.config.batch_timeout,
                ))
            })
            .clone()
    }

    /// Send `message` to `dest` on `protocol`.
    ///
    /// - `urgent` bypasses batching and goes out immediately.
    /// - `dedupe_key`, when set, marks this as a request subject to the
    ///   dedupe window; a duplicate within the window is silently dropped.
    pub async fn send(
        &self,
        dest: NodeId,
        protocol: &str,
        message: Message,
        urgent: bool,
        dedupe_key: Option<RequestKey<'_>>,
    ) -> Result<(), OptimizerError> {
        if let Some(key) = dedupe_key {
            if self.dedupe.check_and_record(key.hash_value()) {
                debug!(protocol, "dropped duplicate request within dedupe window");
                return Ok(());
            }
        }

        if urgent {
            return self.send_single(dest, protocol, message);
        }

        let queue = self.queue_for(dest, protocol);
        let sender_id = self.transport.node_id();
        let ts = now_ms();
        match queue.enqueue(sender_id, ts, message).await {
            batch::EnqueueOutcome::FlushNow(envelopes) => {
                self.send_single(dest, protocol, batch::into_batch_message(envelopes))
            },
            batch::EnqueueOutcome::Buffered => {
                let transport = self.transport.clone();
                let protocol = protocol.to_string();
                let threshold = self.config.compression_threshold;
                queue.spawn_timer(move |envelopes| async move {
                    let message = batch::into_batch_message(envelopes);
                    send_compressed(&transport, dest, &protocol, message, threshold);
                });
                Ok(())
            },
        }
    }

    fn send_single(&self, dest: NodeId, protocol: &str, message: Message) -> Result<(), OptimizerError> {
        send_compressed(&self.transport, dest, protocol, message, self.config.compression_threshold);
        Ok(())
    }

    /// Broadcast `message`, subject to the same urgent/dedupe rules as
    /// [`NetOptimizer::send`], to every node currently subscribed on
    /// `protocol`.
    pub async fn broadcast(
        &self,
        protocol: &str,
        message: Message,
        dedupe_key: Option<RequestKey<'_>>,
    ) -> Result<(), OptimizerError> {
        if let Some(key) = dedupe_key {
            if self.dedupe.check_and_record(key.hash_value()) {
                return Ok(());
            }
        }
        let bytes = bincode::serialize(&message).map_err(|e| OptimizerError::Serialize(e.to_string()))?;
        let envelope = compression::wrap(&bytes, self.config.compression_threshold, compression::Scheme::Best);
        let outer = bincode::serialize(&envelope).map_err(|e| OptimizerError::Serialize(e.to_string()))?;
        self.transport.broadcast(protocol, outer);
        Ok(())
    }

    /// Decode bytes received over [`rednet_transport::Transport`] back into
    /// the ordered list of logical messages they represent (unwrapping
    /// compression and expanding batches).
    pub fn decode(bytes: &[u8]) -> Result<Vec<Message>, OptimizerError> {
        let envelope: CompressedEnvelope =
            bincode::deserialize(bytes).map_err(|e| OptimizerError::Deserialize(e.to_string()))?;
        let inner = compression::unwrap(&envelope);
        let message: Message =
            bincode::deserialize(&inner).map_err(|e| OptimizerError::Deserialize(e.to_string()))?;
        match message {
            Message::Batch(batch) => Ok(batch.messages.into_iter().map(|e| e.message).collect()),
            other => Ok(vec![other]),
        }
    }
}

fn send_compressed(transport: &Transport, dest: NodeId, protocol: &str, message: Message, threshold: usize) {
    let Ok(bytes) = bincode::serialize(&message) else {
        warn!(protocol, "failed to serialize outbound message; dropping");
        return;
    };
    let envelope = compression::wrap(&bytes, threshold, compression::Scheme::Best);
    let Ok(outer) = bincode::serialize(&envelope) else {
        warn!(protocol, "failed to serialize compressed envelope; dropping");
        return;
    };
    transport.send(dest, protocol, outer);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rednet_transport::Network;
    use rednet_types::wire::{DnsQuery, Message};

    use super::*;

    #[tokio::test]
    async fn urgent_messages_bypass_batching_and_round_trip() {
        let net = Network::new();
        let sender = NetOptimizer::new(net.transport(1), Config::default());
        let receiver_transport = net.transport(2);
        let mut sub = receiver_transport.subscribe("dns");

        sender
            .send(
                2,
                "dns",
                Message::DnsQuery(DnsQuery {
                    domain: "shop".into(),
                }),
                true,
                None,
            )
            .await
            .unwrap();

        let (_, bytes) = sub.receive(Duration::from_millis(100)).await.unwrap();
        let messages = NetOptimizer::decode(&bytes).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], Message::DnsQuery(q) if q.domain == "shop"));
    }

    #[tokio::test]
    async fn non_urgent_messages_are_batched_and_flushed_by_size() {
        let net = Network::new();
        let mut config = Config::default();
        config.batch_size = 2;
        config.batch_timeout = Duration::from_secs(10);
        let sender = NetOptimizer::new(net.transport(1), config);
        let receiver_transport = net.transport(2);
        let mut sub = receiver_transport.subscribe("dns");

        for domain in ["a", "b"] {
            sender
                .send(
                    2,
                    "dns",
                    Message::DnsQuery(DnsQuery {
                        domain: domain.into(),
                    }),
                    false,
                    None,
                )
                .await
                .unwrap();
        }

        let (_, bytes) = sub.receive(Duration::from_millis(200)).await.unwrap();
        let messages = NetOptimizer::decode(&bytes).unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_requests_within_window_are_dropped() {
        let net = Network::new();
        let sender = NetOptimizer::new(net.transport(1), Config::default());
        let receiver_transport = net.transport(2);
        let mut sub = receiver_transport.subscribe("dns");

        let key = RequestKey {
            kind: "DNS_QUERY",
            url: "shop",
            method: "GET",
            params: "",
        };

        for _ in 0..2 {
            sender
                .send(
                    2,
                    "dns",
                    Message::DnsQuery(DnsQuery {
                        domain: "shop".into(),
                    }),
                    true,
                    Some(key.clone()),
                )
                .await
                .unwrap();
        }

        assert!(sub.receive(Duration::from_millis(50)).await.is_some());
        assert!(sub.receive(Duration::from_millis(50)).await.is_none());
    }
}
