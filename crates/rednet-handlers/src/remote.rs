//! Fetching `<name>.comp<id>.rednet/<path>` content from the owning node
//! over Transport, and the responder loop that serves this node's local
//! filesystem to remote fetchers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rednet_net_optimizer::NetOptimizer;
use rednet_transport::Transport;
use rednet_types::wire::{Message, PageRequest, PageResponse};
use rednet_types::NodeId;
use tokio::sync::{oneshot, Notify};
use tracing::trace;

use crate::content_type::{self, ContentType};
use crate::error::HandlerError;
use crate::fs;

const PAGE_PROTOCOL: &str = "page";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub type PendingPages = Arc<DashMap<u64, oneshot::Sender<PageResponse>>>;

/// Request `path` from `owner_id`, waiting up to `timeout` for a reply.
pub async fn fetch(
    optimizer: &Arc<NetOptimizer>,
    pending: &PendingPages,
    owner_id: NodeId,
    path: &str,
    timeout: Duration,
) -> Result<(Vec<u8>, ContentType), HandlerError> {
    let request_id = rand::random();
    let (tx, rx) = oneshot::channel();
    pending.insert(request_id, tx);

    let message = Message::PageRequest(PageRequest {
        request_id,
        path: path.to_string(),
    });
    let _ = optimizer.send(owner_id, PAGE_PROTOCOL, message, true, None).await;

    let result = tokio::time::timeout(timeout, rx).await;
    pending.remove(&request_id);

    match result {
        Ok(Ok(response)) if response.found => Ok((response.content, content_type::infer(path))),
        Ok(Ok(_)) => Err(HandlerError::NotFound),
        Ok(Err(_)) => Err(HandlerError::FetchTimeout),
        Err(_) => Err(HandlerError::FetchTimeout),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn(
    transport: Transport,
    optimizer: Arc<NetOptimizer>,
    root_dir: PathBuf,
    index_extensions: Vec<String>,
    pending: PendingPages,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    tokio::spawn(async move {
        let mut sub = transport.subscribe(PAGE_PROTOCOL);
        running.store(true, Ordering::SeqCst);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                delivery = sub.receive(POLL_INTERVAL) => {
                    let Some((sender_id, bytes)) = delivery else { continue };
                    let Ok(messages) = NetOptimizer::decode(&bytes) else { continue };
                    for message in messages {
                        handle_message(message, sender_id, &optimizer, &root_dir, &index_extensions, &pending);
                    }
                },
            }
        }

        running.store(false, Ordering::SeqCst);
    });
}

fn handle_message(
    message: Message,
    sender_id: NodeId,
    optimizer: &Arc<NetOptimizer>,
    root_dir: &std::path::Path,
    index_extensions: &[String],
    pending: &PendingPages,
) {
    match message {
        Message::PageRequest(request) => {
            let (found, content) = match fs::read(root_dir, index_extensions, &request.path) {
                Ok((bytes, _)) => (true, bytes),
                Err(_) => (false, Vec::new()),
            };
            let response = PageResponse {
                request_id: request.request_id,
                found,
                content,
            };
            let optimizer = optimizer.clone();
            tokio::spawn(async move {
                let _ = optimizer
                    .send(sender_id, PAGE_PROTOCOL, Message::PageResponse(response), true, None)
                    .await;
                trace!(dest = sender_id, "answered page request");
            });
        },
        Message::PageResponse(response) => {
            if let Some((_, tx)) = pending.remove(&response.request_id) {
                let _ = tx.send(response);
            }
        },
        _ => {},
    }
}
