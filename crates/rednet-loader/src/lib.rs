//! Concurrent Loader (C7): a bounded-parallel fetch dispatcher sitting
//! between Tab State (C6) and Content Handlers (C8) (spec §4.7).

mod dispatcher;
pub mod config;
pub mod error;
pub mod metrics;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use rednet_handlers::Handlers;
use rednet_tabs::{TabId, TabRegistry};
use rednet_types::lifecycle::WithStartAndShutdown;
use tokio::sync::{Notify, Semaphore};

pub use config::Config;
pub use error::LoaderError;
pub use metrics::MetricsSnapshot;

/// Invoked exactly once per `queueLoad` call (spec §4.7 "Dispatch"),
/// whether the load ultimately succeeded, failed, or was cancelled.
pub type LoadCallback = Box<dyn FnOnce(LoadOutcome) + Send>;

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub success: bool,
    pub tab_id: TabId,
    pub url: String,
    pub error: Option<String>,
}

struct LoadRequest {
    tab_id: TabId,
    url: String,
    callback: LoadCallback,
    retries_remaining: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct LoadingStatus {
    pub loading: usize,
    pub queued: usize,
    pub max_concurrent: usize,
}

pub struct Loader {
    config: Config,
    handlers: Arc<Handlers>,
    tabs: Arc<TabRegistry>,
    queue: dispatcher::Queue,
    queue_signal: Arc<Notify>,
    semaphore: Arc<Semaphore>,
    cancel_signals: dispatcher::CancelSignals,
    active_tabs: dispatcher::ActiveTabs,
    metrics: Arc<metrics::Metrics>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Loader {
    pub fn new(config: Config, handlers: Arc<Handlers>, tabs: Arc<TabRegistry>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config,
            handlers,
            tabs,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            queue_signal: Arc::new(Notify::new()),
            semaphore,
            cancel_signals: Arc::new(DashMap::new()),
            active_tabs: Arc::new(DashMap::new()),
            metrics: Arc::new(metrics::Metrics::default()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Queue `url` for `tab_id`. Rejects if the tab is already loading or
    /// has a load queued (spec §4.7 "rejects if the tab is already
    /// loading").
    pub fn queue_load(
        &self,
        tab_id: TabId,
        url: impl Into<String>,
        callback: impl FnOnce(LoadOutcome) + Send + 'static,
    ) -> Result<(), LoaderError> {
        if self.active_tabs.insert(tab_id, ()).is_some() {
            return Err(LoaderError::AlreadyLoading(tab_id));
        }
        self.metrics.inc_queued();
        self.queue.lock().unwrap().push_back(LoadRequest {
            tab_id,
            url: url.into(),
            callback: Box::new(callback),
            retries_remaining: self.config.max_retries,
        });
        self.queue_signal.notify_one();
        Ok(())
    }

    /// Remove a queued load or signal an in-flight one to stop; either way
    /// the callback is invoked with a "cancelled" outcome exactly once.
    pub fn cancel_load(&self, tab_id: TabId) {
        let removed = {
            let mut queue = self.queue.lock().unwrap();
            let position = queue.iter().position(|request| request.tab_id == tab_id);
            position.and_then(|index| queue.remove(index))
        };

        if let Some(request) = removed {
            self.metrics.dec_queued();
            self.active_tabs.remove(&tab_id);
            let _ = self.tabs.with_tab(tab_id, |tab| tab.loading = false);
            (request.callback)(LoadOutcome {
                success: false,
                tab_id,
                url: request.url,
                error: Some("cancelled".to_string()),
            });
            return;
        }

        if let Some(signal) = self.cancel_signals.get(&tab_id) {
            signal.notify_waiters();
        }
    }

    /// Cancel any current load for `tab_id` and re-queue its current
    /// history entry's url. Waits for an in-flight load's cancellation to
    /// actually land before re-queuing, so the two attempts never overlap.
    pub async fn reload_tab(
        &self,
        tab_id: TabId,
        callback: impl FnOnce(LoadOutcome) + Send + 'static,
    ) -> Result<(), LoaderError> {
        self.cancel_load(tab_id);
        for _ in 0..100 {
            if !self.is_loading(tab_id) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let url = self
            .tabs
            .with_tab(tab_id, |tab| tab.history.current().map(|entry| entry.url.clone()))
            .map_err(|_| LoaderError::UnknownTab(tab_id))?
            .ok_or(LoaderError::NothingToReload(tab_id))?;
        self.queue_load(tab_id, url, callback)
    }

    pub fn is_loading(&self, tab_id: TabId) -> bool {
        self.active_tabs.contains_key(&tab_id)
    }

    pub fn get_loading_status(&self) -> LoadingStatus {
        let snapshot = self.metrics.snapshot();
        LoadingStatus {
            loading: snapshot.in_flight as usize,
            queued: snapshot.queued as usize,
            max_concurrent: self.config.max_concurrent,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl WithStartAndShutdown for Loader {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        if self.is_running() {
            return;
        }
        dispatcher::spawn(
            self.config.clone(),
            self.handlers.clone(),
            self.tabs.clone(),
            self.queue.clone(),
            self.queue_signal.clone(),
            self.semaphore.clone(),
            self.cancel_signals.clone(),
            self.active_tabs.clone(),
            self.metrics.clone(),
            self.running.clone(),
            self.shutdown.clone(),
        );
        tokio::task::yield_now().await;
    }

    async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    use rednet_dns::DnsCore;
    use rednet_handlers::{Config as HandlersConfig, SimpleMarkupParser, StaticTemplates};
    use rednet_sandbox::Sandbox;
    use rednet_transport::Network;
    use rednet_types::peers::PeerDirectory;
    use tokio::sync::oneshot;

    use super::*;

    fn handlers_over(root_dir: std::path::PathBuf) -> Arc<Handlers> {
        let net = Network::new();
        let dns = Arc::new(DnsCore::new(1, rednet_dns::Config::default(), net.transport(1), PeerDirectory::new()));
        let sandbox = Arc::new(Sandbox::new(rednet_sandbox::Config::default()));
        let mut config = HandlersConfig::default();
        config.root_dir = root_dir;
        Arc::new(Handlers::new(
            config,
            net.transport(1),
            dns,
            sandbox,
            StdArc::new(SimpleMarkupParser),
            StdArc::new(StaticTemplates::new()),
        ))
    }

    #[tokio::test]
    async fn queues_and_completes_a_load_successfully() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.rwml"), b"<title>Home</title>welcome").unwrap();
        let handlers = handlers_over(dir.path().to_path_buf());
        let tabs = Arc::new(TabRegistry::new());
        let tab_id = tabs.create_tab(false);

        let loader = Loader::new(Config::default(), handlers, tabs.clone());
        loader.start().await;

        let (tx, rx) = oneshot::channel();
        loader
            .queue_load(tab_id, "home.rwml", move |outcome| {
                let _ = tx.send(outcome);
            })
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert!(outcome.success);
        let title = tabs.with_tab(tab_id, |tab| tab.title.clone()).unwrap();
        assert_eq!(title, "Home");
        assert!(!loader.is_loading(tab_id));
    }

    #[tokio::test]
    async fn rejects_queueing_a_second_load_for_the_same_tab() {
        let dir = tempfile::tempdir().unwrap();
        let handlers = handlers_over(dir.path().to_path_buf());
        let tabs = Arc::new(TabRegistry::new());
        let tab_id = tabs.create_tab(false);

        let mut config = Config::default();
        config.max_concurrent = 1;
        let loader = Loader::new(config, handlers, tabs);

        loader.queue_load(tab_id, "slow.rwml", |_| {}).unwrap();
        let err = loader.queue_load(tab_id, "slow.rwml", |_| {}).unwrap_err();
        assert!(matches!(err, LoaderError::AlreadyLoading(_)));
    }

    #[tokio::test]
    async fn missing_file_retries_then_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let handlers = handlers_over(dir.path().to_path_buf());
        let tabs = Arc::new(TabRegistry::new());
        let tab_id = tabs.create_tab(false);

        let mut config = Config::default();
        config.max_retries = 1;
        let loader = Loader::new(config, handlers, tabs.clone());
        loader.start().await;

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let (tx, rx) = oneshot::channel();
        loader
            .queue_load(tab_id, "missing.rwml", move |outcome| {
                attempts_clone.fetch_add(1, AtomicOrdering::SeqCst);
                let _ = tx.send(outcome);
            })
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert!(!outcome.success);
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 1);
        let metrics = loader.metrics();
        assert_eq!(metrics.retried, 1);
    }

    #[tokio::test]
    async fn cancel_load_reports_cancellation_for_a_queued_request() {
        let dir = tempfile::tempdir().unwrap();
        let handlers = handlers_over(dir.path().to_path_buf());
        let tabs = Arc::new(TabRegistry::new());
        let tab_id = tabs.create_tab(false);

        let mut config = Config::default();
        config.max_concurrent = 1;
        let loader = Loader::new(config, handlers, tabs);

        loader.queue_load(tab_id, "a.rwml", |_| {}).unwrap();
        let (tx, rx) = oneshot::channel();
        loader
            .queue_load(100, "b.rwml", move |outcome| {
                let _ = tx.send(outcome);
            })
            .unwrap();
        loader.cancel_load(100);

        let outcome = rx.await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("cancelled"));
    }
}
