//! Batching (spec §4.2). Small, non-urgent messages to the same
//! `(destination, protocol)` accumulate for up to `batch_timeout` or until
//! `batch_size` messages / `max_batch_size` bytes, then go out as one
//! `Message::Batch` envelope. A `generation` counter lets a size-triggered
//! flush invalidate the pending timer flush for the same queue, so a batch
//! is never sent twice.

use std::sync::Arc;
use std::time::Duration;

use rednet_types::wire::{BatchMessage, Envelope, Message};
use rednet_types::{NodeId, Timestamp};
use tokio::sync::Mutex;

struct QueueState {
    envelopes: Vec<Envelope>,
    bytes: usize,
    generation: u64,
}

impl QueueState {
    fn new() -> Self {
        Self {
            envelopes: Vec::new(),
            bytes: 0,
            generation: 0,
        }
    }
}

pub struct BatchQueue {
    state: Arc<Mutex<QueueState>>,
    batch_size: usize,
    max_batch_size: usize,
    batch_timeout: Duration,
}

/// What [`BatchQueue::enqueue`] tells the caller to do next.
pub enum EnqueueOutcome {
    /// Just buffered; a timer will flush it (or a later enqueue will).
    Buffered,
    /// The queue hit a size/count threshold — flush immediately with the
    /// returned messages.
    FlushNow(Vec<Envelope>),
}

impl BatchQueue {
    pub fn new(batch_size: usize, max_batch_size: usize, batch_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::new())),
            batch_size,
            max_batch_size,
            batch_timeout,
        }
    }

    /// Add `message` to the queue. Returns either `Buffered` (caller should
    /// make sure a flush timer is running — see [`BatchQueue::spawn_timer`])
    /// or `FlushNow` with everything that should be sent immediately.
    pub async fn enqueue(&self, sender_id: NodeId, ts: Timestamp, message: Message) -> EnqueueOutcome {
        let approx_size = approx_message_size(&message);
        let mut state = self.state.lock().await;
        state.envelopes.push(Envelope::new(sender_id, ts, message));
        state.bytes += approx_size;

        if state.envelopes.len() >= self.batch_size || state.bytes >= self.max_batch_size {
            let envelopes = std::mem::take(&mut state.envelopes);
            state.bytes = 0;
            state.generation += 1;
            EnqueueOutcome::FlushNow(envelopes)
        } else {
            EnqueueOutcome::Buffered
        }
    }

    /// Spawn (if one isn't already pending) a task that flushes this queue
    /// after `batch_timeout`, unless a size-triggered flush already beat it
    /// to it. `on_flush` is invoked with the queued envelopes when the timer
    /// fires and the queue is non-empty.
    pub fn spawn_timer<F, Fut>(&self, on_flush: F)
    where
        F: FnOnce(Vec<Envelope>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let state = self.state.clone();
        let timeout = self.batch_timeout;
        tokio::spawn(async move {
            let generation_at_spawn = {
                let guard = state.lock().await;
                guard.generation
            };
            tokio::time::sleep(timeout).await;
            let mut guard = state.lock().await;
            if guard.generation != generation_at_spawn || guard.envelopes.is_empty() {
                // Either a size-triggered flush already happened, or
                // there's nothing new to send.
                return;
            }
            let envelopes = std::mem::take(&mut guard.envelopes);
            guard.bytes = 0;
            guard.generation += 1;
            drop(guard);
            on_flush(envelopes).await;
        });
    }
}

fn approx_message_size(message: &Message) -> usize {
    bincode::serialize(message).map(|b| b.len()).unwrap_or(64)
}

pub fn into_batch_message(envelopes: Vec<Envelope>) -> Message {
    Message::Batch(BatchMessage { messages: envelopes })
}
