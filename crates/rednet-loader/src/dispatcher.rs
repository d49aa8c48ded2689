//! The background task that drains the pending-load queue up to
//! `maxConcurrent` at a time, enforcing the per-request timeout and retry
//! policy (spec §4.7 "Scheduling"/"Dispatch").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rednet_handlers::{Handlers, ProcessedContent};
use rednet_tabs::{TabId, TabRegistry};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::{LoadOutcome, LoadRequest};

pub type Queue = Arc<Mutex<VecDeque<LoadRequest>>>;
pub type CancelSignals = Arc<DashMap<TabId, Arc<Notify>>>;
pub type ActiveTabs = Arc<DashMap<TabId, ()>>;

#[allow(clippy::too_many_arguments)]
pub fn spawn(
    config: Config,
    handlers: Arc<Handlers>,
    tabs: Arc<TabRegistry>,
    queue: Queue,
    queue_signal: Arc<Notify>,
    semaphore: Arc<Semaphore>,
    cancel_signals: CancelSignals,
    active_tabs: ActiveTabs,
    metrics: Arc<Metrics>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    tokio::spawn(async move {
        running.store(true, Ordering::SeqCst);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = queue_signal.notified() => {},
            }

            loop {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let next = queue.lock().unwrap().pop_front();
                match next {
                    Some(request) => {
                        metrics.dec_queued();
                        spawn_attempt(
                            request,
                            permit,
                            config.clone(),
                            handlers.clone(),
                            tabs.clone(),
                            queue.clone(),
                            queue_signal.clone(),
                            cancel_signals.clone(),
                            active_tabs.clone(),
                            metrics.clone(),
                        );
                    },
                    None => break,
                }
            }
        }

        running.store(false, Ordering::SeqCst);
    });
}

enum Attempt {
    Success(ProcessedContent),
    Cancelled,
    TimedOut,
    Failed(String),
}

#[allow(clippy::too_many_arguments)]
fn spawn_attempt(
    request: LoadRequest,
    permit: tokio::sync::OwnedSemaphorePermit,
    config: Config,
    handlers: Arc<Handlers>,
    tabs: Arc<TabRegistry>,
    queue: Queue,
    queue_signal: Arc<Notify>,
    cancel_signals: CancelSignals,
    active_tabs: ActiveTabs,
    metrics: Arc<Metrics>,
) {
    tokio::spawn(async move {
        let _permit = permit;
        let cancel_signal = Arc::new(Notify::new());
        cancel_signals.insert(request.tab_id, cancel_signal.clone());
        metrics.inc_in_flight();
        let _ = tabs.with_tab(request.tab_id, |tab| tab.loading = true);

        let attempt = tokio::select! {
            _ = cancel_signal.notified() => Attempt::Cancelled,
            result = tokio::time::timeout(config.load_timeout, handlers.fetch(&request.url)) => {
                match result {
                    Ok(Ok(content)) => Attempt::Success(content),
                    Ok(Err(err)) => Attempt::Failed(err.to_string()),
                    Err(_) => Attempt::TimedOut,
                }
            },
        };

        metrics.dec_in_flight();
        cancel_signals.remove(&request.tab_id);

        match attempt {
            Attempt::Success(content) => {
                finish(&tabs, &active_tabs, request, true, None, Some(content));
            },
            Attempt::Cancelled => {
                finish(&tabs, &active_tabs, request, false, Some("cancelled".to_string()), None);
            },
            Attempt::TimedOut => {
                metrics.inc_timed_out();
                if request.retries_remaining > 0 {
                    metrics.inc_retried();
                    requeue(request, &queue, &queue_signal, &metrics);
                } else {
                    finish(
                        &tabs,
                        &active_tabs,
                        request,
                        false,
                        Some("cancelled: timeout".to_string()),
                        None,
                    );
                }
            },
            Attempt::Failed(message) => {
                if request.retries_remaining > 0 {
                    metrics.inc_retried();
                    requeue(request, &queue, &queue_signal, &metrics);
                } else {
                    finish(&tabs, &active_tabs, request, false, Some(message), None);
                }
            },
        }
    });
}

fn requeue(mut request: LoadRequest, queue: &Queue, queue_signal: &Arc<Notify>, metrics: &Arc<Metrics>) {
    request.retries_remaining -= 1;
    debug!(tab_id = request.tab_id, retries_remaining = request.retries_remaining, "retrying load");
    metrics.inc_queued();
    queue.lock().unwrap().push_back(request);
    queue_signal.notify_one();
}

fn finish(
    tabs: &Arc<TabRegistry>,
    active_tabs: &ActiveTabs,
    request: LoadRequest,
    success: bool,
    error: Option<String>,
    content: Option<ProcessedContent>,
) {
    let LoadRequest {
        tab_id, url, callback, ..
    } = request;

    let updated = tabs.with_tab(tab_id, |tab| {
        tab.loading = false;
        if let Some(content) = &content {
            if let Some(title) = content.title() {
                tab.title = title.to_string();
            }
            tab.content = Some(render_content(content));
            tab.error = None;
        } else if let Some(error) = &error {
            tab.error = Some(error.clone());
        }
    });
    active_tabs.remove(&tab_id);

    match updated {
        Ok(()) => callback(LoadOutcome {
            success,
            tab_id,
            url,
            error,
        }),
        Err(_) => {
            // Tab was closed mid-load (spec §4.7 edge case): drop the
            // callback, there is nothing left to report to.
            warn!(tab_id, "load finished after its tab was closed; dropping callback");
        },
    }
}

fn render_content(content: &ProcessedContent) -> String {
    match content {
        ProcessedContent::Markup(doc) => doc.ast.to_string(),
        ProcessedContent::Text(text) => text.clone(),
    }
}
