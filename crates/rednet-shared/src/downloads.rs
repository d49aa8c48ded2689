//! Download manager (spec §4.5): a streamed background task per download,
//! terminal records moved into a bounded completed ring.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rednet_types::{now_ms, Timestamp};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SharedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Download {
    pub id: u64,
    pub url: String,
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
    pub status: DownloadStatus,
    pub started_at: Timestamp,
}

impl Download {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, DownloadStatus::InProgress)
    }
}

/// A chunk of streamed data, or the terminal signal for a download.
pub enum StreamEvent {
    Progress { bytes: u64 },
    Done { total_bytes: u64 },
    Error,
}

struct State {
    active: std::collections::HashMap<u64, Download>,
    completed: VecDeque<Download>,
    max_completed: usize,
    next_id: u64,
}

pub struct DownloadManager {
    state: Arc<Mutex<State>>,
    cancel_signals: Arc<Mutex<std::collections::HashMap<u64, Arc<tokio::sync::Notify>>>>,
}

impl DownloadManager {
    pub fn new(max_completed: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                active: std::collections::HashMap::new(),
                completed: VecDeque::new(),
                max_completed,
                next_id: 0,
            })),
            cancel_signals: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    /// Start a download, spawning a background task that drains `events`
    /// (the streaming source, owned by the caller) into the record's
    /// progress until a terminal event arrives.
    pub fn start(&self, url: &str, mut events: mpsc::Receiver<StreamEvent>) -> u64 {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.active.insert(
                id,
                Download {
                    id,
                    url: url.to_string(),
                    bytes_received: 0,
                    total_bytes: None,
                    status: DownloadStatus::InProgress,
                    started_at: now_ms(),
                },
            );
            id
        };

        let cancel = Arc::new(tokio::sync::Notify::new());
        self.cancel_signals.lock().unwrap().insert(id, cancel.clone());

        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.notified() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let mut guard = state.lock().unwrap();
                        let Some(download) = guard.active.get_mut(&id) else { break };
                        match event {
                            StreamEvent::Progress { bytes } => download.bytes_received += bytes,
                            StreamEvent::Done { total_bytes } => {
                                download.total_bytes = Some(total_bytes);
                                download.status = DownloadStatus::Completed;
                                debug!(id, "download completed");
                                break;
                            },
                            StreamEvent::Error => {
                                download.status = DownloadStatus::Failed;
                                warn!(id, "download failed");
                                break;
                            },
                        }
                    },
                }
            }
            Self::retire(&state, id);
        });

        id
    }

    fn retire(state: &Arc<Mutex<State>>, id: u64) {
        let mut guard = state.lock().unwrap();
        if let Some(download) = guard.active.remove(&id) {
            if guard.completed.len() >= guard.max_completed {
                guard.completed.pop_front();
            }
            guard.completed.push_back(download);
        }
    }

    pub fn cancel(&self, id: u64) -> Result<(), SharedError> {
        let mut state = self.state.lock().unwrap();
        let download = state.active.get_mut(&id).ok_or(SharedError::DownloadNotFound(id.to_string()))?;
        if download.is_terminal() {
            return Err(SharedError::DownloadAlreadyTerminal(id.to_string()));
        }
        download.status = DownloadStatus::Cancelled;
        drop(state);

        if let Some(signal) = self.cancel_signals.lock().unwrap().remove(&id) {
            signal.notify_waiters();
        }
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<Download> {
        let state = self.state.lock().unwrap();
        state
            .active
            .get(&id)
            .cloned()
            .or_else(|| state.completed.iter().find(|d| d.id == id).cloned())
    }
}
