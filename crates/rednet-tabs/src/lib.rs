//! Tab State (C6): per-tab history, form data, cookies/local storage,
//! scroll/zoom, find-in-page and load metrics (spec §4.6).

pub mod forms;
pub mod history;
pub mod storage;
pub mod view;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use rednet_types::error::{ErrorKind, HasErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use forms::FormData;
pub use history::{History, HistoryEntry};
pub use storage::TabStorage;
pub use view::{FindInPage, LoadMetrics, ScrollZoom};

pub type TabId = u64;

const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Error)]
pub enum TabError {
    #[error("no tab with id {0}")]
    NotFound(TabId),
}

impl HasErrorKind for TabError {
    fn kind(&self) -> ErrorKind {
        match self {
            TabError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

pub struct TabState {
    pub id: TabId,
    pub privacy_mode: bool,
    pub history: History,
    pub forms: FormData,
    pub storage: TabStorage,
    pub scroll_zoom: ScrollZoom,
    pub find: FindInPage,
    pub metrics: LoadMetrics,
    pub title: String,
    pub content: Option<String>,
    pub error: Option<String>,
    /// Set by the Concurrent Loader (C7) while a fetch for this tab is
    /// in flight.
    pub loading: bool,
}

impl TabState {
    pub fn new(id: TabId, privacy_mode: bool) -> Self {
        Self {
            id,
            privacy_mode,
            history: History::new(DEFAULT_MAX_HISTORY),
            forms: FormData::default(),
            storage: TabStorage::default(),
            scroll_zoom: ScrollZoom::default(),
            find: FindInPage::default(),
            metrics: LoadMetrics::default(),
            title: String::new(),
            content: None,
            error: None,
            loading: false,
        }
    }

    /// A pure data record suitable for persisting and restoring (spec §4.6
    /// "Serialization"); expired cookies are filtered out.
    pub fn serialize(&self) -> TabSnapshot {
        TabSnapshot {
            id: self.id,
            title: self.title.clone(),
            history: self.history.clone(),
            forms: self.forms.clone(),
            live_cookies: if self.privacy_mode {
                Default::default()
            } else {
                self.storage.live_cookies()
            },
            scroll_zoom: self.scroll_zoom,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub title: String,
    pub history: History,
    pub forms: FormData,
    pub live_cookies: std::collections::HashMap<String, std::collections::HashMap<String, storage::ScopedCookie>>,
    pub scroll_zoom: ScrollZoom,
    pub metrics: LoadMetrics,
}

/// Holds every open tab. Not a `WithStartAndShutdown` component itself (no
/// background task); owned by `rednet-node` alongside the components that
/// are.
pub struct TabRegistry {
    tabs: DashMap<TabId, Mutex<TabState>>,
    next_id: AtomicU64,
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TabRegistry {
    pub fn new() -> Self {
        Self {
            tabs: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn create_tab(&self, privacy_mode: bool) -> TabId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.tabs.insert(id, Mutex::new(TabState::new(id, privacy_mode)));
        id
    }

    /// Close a tab, dropping its callback and any state with it (loader
    /// cancellation of in-flight work for this tab is the caller's
    /// responsibility; spec §4.7 "a tab closed mid-load").
    pub fn close_tab(&self, id: TabId) -> Result<(), TabError> {
        self.tabs.remove(&id).map(|_| ()).ok_or(TabError::NotFound(id))
    }

    pub fn with_tab<R>(&self, id: TabId, f: impl FnOnce(&mut TabState) -> R) -> Result<R, TabError> {
        let entry = self.tabs.get(&id).ok_or(TabError::NotFound(id))?;
        Ok(f(&mut entry.lock().unwrap()))
    }

    pub fn exists(&self, id: TabId) -> bool {
        self.tabs.contains_key(&id)
    }

    pub fn open_tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|e| *e.key()).collect()
    }
}
