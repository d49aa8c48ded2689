//! Shared Resources (C5): page cache, connection pool, download manager and
//! shared cookies (spec §4.5), plus the background task that periodically
//! flushes the cookie jar to disk.

pub mod config;
pub mod cookies;
pub mod downloads;
pub mod error;
pub mod page_cache;
pub mod pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rednet_types::lifecycle::WithStartAndShutdown;
use tokio::sync::Notify;
use tracing::{info, warn};

pub use config::Config;
pub use cookies::{Cookie, CookieJar, CookieOptions};
pub use downloads::{Download, DownloadManager, DownloadStatus, StreamEvent};
pub use error::SharedError;
pub use page_cache::PageCache;
pub use pool::ConnectionPool;

pub struct SharedResources {
    config: Config,
    pub page_cache: Mutex<PageCache>,
    pub pool: Mutex<ConnectionPool>,
    pub downloads: DownloadManager,
    pub cookies: Arc<Mutex<CookieJar>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl SharedResources {
    pub fn new(config: Config) -> Self {
        let cookies = match config.cookies_path.as_deref().map(std::path::Path::new) {
            Some(path) => CookieJar::load(path).unwrap_or_default(),
            None => CookieJar::new(),
        };
        Self {
            page_cache: Mutex::new(PageCache::new(config.page_cache_max_bytes, config.page_cache_ttl)),
            pool: Mutex::new(ConnectionPool::new(config.max_connections_per_domain, config.connection_idle_timeout)),
            downloads: DownloadManager::new(config.max_completed_downloads),
            cookies: Arc::new(Mutex::new(cookies)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }
}

#[async_trait]
impl WithStartAndShutdown for SharedResources {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        if self.is_running() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let Some(path) = self.config.cookies_path.clone() else {
            info!("no cookies_path configured; skipping persistence loop");
            return;
        };
        let cookies = self.cookies.clone();
        let interval = self.config.cookie_persistence_interval;
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(interval) => {
                        let snapshot = cookies.lock().unwrap();
                        if let Err(err) = snapshot.save(std::path::Path::new(&path)) {
                            warn!(%err, "failed to persist cookie jar");
                        }
                    },
                }
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.running.store(false, Ordering::SeqCst);
        if let Some(path) = self.config.cookies_path.as_deref() {
            let snapshot = self.cookies.lock().unwrap();
            if let Err(err) = snapshot.save(std::path::Path::new(path)) {
                warn!(%err, "failed to persist cookie jar on shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_without_cookies_path_does_not_spawn_a_persistence_loop() {
        let resources = SharedResources::new(Config::default());
        resources.start().await;
        assert!(resources.is_running());
        resources.shutdown().await;
        assert!(!resources.is_running());
    }
}
