//! Transport (C1): message-oriented broadcast domain with unicast
//! addressing by integer node id, spec §4.1.
//!
//! There is no real radio hardware here or in any of the teacher's crates'
//! tests either: `lightning-broadcast`'s own test suite runs its gossip
//! protocol over `lib/simulon`, an in-process simulated network. We take the
//! same approach: a [`Network`] is the shared broadcast domain (one per
//! test, or one per process for a real deployment embedding a real radio
//! driver underneath it), and each node holds a [`Transport`] handle into
//! it.
//!
//! Contract (spec §4.1): no ordering guarantee across senders, FIFO per
//! (sender, protocol), payloads are opaque bytes, delivery may be lost or
//! duplicated, failures are silent.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rednet_types::NodeId;
use tokio::sync::mpsc;
use tracing::trace;

/// A delivered message: who sent it, and the opaque payload bytes.
pub type Delivery = (NodeId, Vec<u8>);

/// Simulates radio-layer unreliability for tests that want to exercise
/// retry logic. Defaults to perfectly reliable delivery.
#[derive(Debug, Clone, Copy)]
pub struct LossModel {
    pub drop_probability: f64,
    pub duplicate_probability: f64,
}

impl Default for LossModel {
    fn default() -> Self {
        Self {
            drop_probability: 0.0,
            duplicate_probability: 0.0,
        }
    }
}

struct Mailbox {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// The shared broadcast domain. Cloning shares the same underlying node
/// table (it's an `Arc` inside), matching the "everyone in range hears a
/// broadcast" model.
#[derive(Clone, Default)]
pub struct Network {
    // keyed by (node_id, protocol)
    mailboxes: Arc<DashMap<(NodeId, String), Mailbox>>,
    loss: LossModel,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loss_model(loss: LossModel) -> Self {
        Self {
            mailboxes: Arc::new(DashMap::new()),
            loss,
        }
    }

    pub fn transport(&self, node_id: NodeId) -> Transport {
        Transport {
            node_id,
            network: self.clone(),
        }
    }

    fn register(&self, node_id: NodeId, protocol: &str) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes
            .insert((node_id, protocol.to_string()), Mailbox { tx });
        rx
    }

    fn deliver_one(&self, dest: NodeId, protocol: &str, delivery: Delivery) {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        if self.loss.drop_probability > 0.0 && rng.gen_bool(self.loss.drop_probability) {
            trace!(dest, protocol, "dropped delivery (simulated loss)");
            return;
        }
        if let Some(entry) = self.mailboxes.get(&(dest, protocol.to_string())) {
            // Fire-and-forget: a full/closed channel is a silent failure,
            // matching the "no ack/retry at this layer" contract.
            let _ = entry.tx.send(delivery.clone());
            if self.loss.duplicate_probability > 0.0 && rng.gen_bool(self.loss.duplicate_probability) {
                let _ = entry.tx.send(delivery);
            }
        }
    }

    fn all_node_ids(&self, protocol: &str, except: NodeId) -> Vec<NodeId> {
        self.mailboxes
            .iter()
            .filter_map(|entry| {
                let (node_id, proto) = entry.key();
                if proto == protocol && *node_id != except {
                    Some(*node_id)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A node's handle into a [`Network`].
#[derive(Clone)]
pub struct Transport {
    node_id: NodeId,
    network: Network,
}

impl Transport {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Best-effort unicast delivery to `dest` on `protocol`.
    pub fn send(&self, dest: NodeId, protocol: &str, payload: Vec<u8>) {
        self.network
            .deliver_one(dest, protocol, (self.node_id, payload));
    }

    /// Best-effort delivery to every other node currently subscribed to
    /// `protocol`.
    pub fn broadcast(&self, protocol: &str, payload: Vec<u8>) {
        for dest in self.network.all_node_ids(protocol, self.node_id) {
            self.network
                .deliver_one(dest, protocol, (self.node_id, payload.clone()));
        }
    }

    /// Subscribe to inbound messages on `protocol`. Must be called once per
    /// (node, protocol) pair; the returned [`Subscription`] is then polled
    /// with [`Subscription::receive`].
    pub fn subscribe(&self, protocol: &str) -> Subscription {
        let rx = self.network.register(self.node_id, protocol);
        Subscription { rx }
    }
}

/// A cooperative-wait handle for inbound messages on one protocol.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Wait up to `timeout` for the next message. Returns `None` on
    /// timeout, matching spec §4.1's `receive(protocol, timeout) -> (sender,
    /// payload) | nil`.
    pub async fn receive(&mut self, timeout: Duration) -> Option<Delivery> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unicast_delivers_to_destination_only() {
        let net = Network::new();
        let a = net.transport(1);
        let b = net.transport(2);
        let c = net.transport(3);

        let mut b_sub = b.subscribe("dns");
        let mut c_sub = c.subscribe("dns");

        a.send(2, "dns", b"hello".to_vec());

        let (sender, payload) = b_sub.receive(Duration::from_millis(100)).await.unwrap();
        assert_eq!(sender, 1);
        assert_eq!(payload, b"hello");

        assert!(c_sub.receive(Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers_except_sender() {
        let net = Network::new();
        let a = net.transport(1);
        let b = net.transport(2);
        let c = net.transport(3);

        let mut a_sub = a.subscribe("dns");
        let mut b_sub = b.subscribe("dns");
        let mut c_sub = c.subscribe("dns");

        a.broadcast("dns", b"ping".to_vec());

        assert!(a_sub.receive(Duration::from_millis(50)).await.is_none());
        assert_eq!(b_sub.receive(Duration::from_millis(100)).await.unwrap().0, 1);
        assert_eq!(c_sub.receive(Duration::from_millis(100)).await.unwrap().0, 1);
    }

    #[tokio::test]
    async fn receive_times_out_when_nothing_arrives() {
        let net = Network::new();
        let a = net.transport(1);
        let mut sub = a.subscribe("dns");
        assert!(sub.receive(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn fifo_per_sender_and_protocol() {
        let net = Network::new();
        let a = net.transport(1);
        let b = net.transport(2);
        let mut sub = b.subscribe("dns");

        for i in 0..5u8 {
            a.send(2, "dns", vec![i]);
        }

        for i in 0..5u8 {
            let (_, payload) = sub.receive(Duration::from_millis(100)).await.unwrap();
            assert_eq!(payload, vec![i]);
        }
    }
}
