//! Search Engine (C11): query parsing, TF-IDF scoring, snippet generation,
//! prefix suggestions and a result cache, all sitting on top of the
//! Search Index (C10).

pub mod cache;
pub mod config;
pub mod error;
pub mod query;
pub mod scoring;
pub mod snippet;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rednet_search_index::{DocId, SearchIndex};
use rednet_types::lifecycle::WithStartAndShutdown;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub use cache::CacheStats;
pub use config::Config;
pub use error::SearchError;
pub use query::QueryNode;
pub use types::{Pagination, SearchHit, SearchResults};

pub struct SearchEngine {
    config: Config,
    index: Arc<Mutex<SearchIndex>>,
    cache: Arc<Mutex<cache::ResultCache>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl SearchEngine {
    pub fn new(config: Config) -> Self {
        let index = SearchIndex::load(&config.index_path).unwrap_or_default();
        let mut cache = cache::ResultCache::new(config.cache_max_entries, config.cache_max_memory_bytes, config.cache_ttl);
        if let Err(err) = cache.load(&config.cache_export_path) {
            debug!(%err, "no existing search result cache export to restore");
        }
        Self {
            config,
            index: Arc::new(Mutex::new(index)),
            cache: Arc::new(Mutex::new(cache)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn add_document(&self, url: impl Into<String>, title: impl Into<String>, content: impl Into<String>, kind: impl Into<String>) -> DocId {
        let doc_id = self.index.lock().unwrap().add_document(url, title, content, kind);
        self.invalidate_cache();
        doc_id
    }

    pub fn remove_document(&self, doc_id: DocId) -> Result<(), SearchError> {
        self.index.lock().unwrap().remove_document(doc_id)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Runs `query` against the index, applying the cache, pagination and
    /// snippet generation (spec §4.11 "Scoring"/"Snippet").
    pub fn search(&self, query: &str, category: Option<&str>, sort: &str, pagination: Pagination) -> Result<SearchResults, SearchError> {
        let key = cache::ResultCache::key(query, category, sort, pagination.limit);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            debug!(query, "search cache hit");
            return Ok(page(&cached, pagination));
        }

        let node = query::parse(query)?;
        let index = self.index.lock().unwrap();
        let all_docs: Vec<DocId> = index.documents().map(|doc| doc.doc_id).collect();
        let mut scored: Vec<(DocId, f64)> = scoring::evaluate(&node, &index, &all_docs).into_iter().collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

        let terms = query_terms(&node);
        let hits: Vec<SearchHit> = scored
            .iter()
            .filter_map(|(doc_id, score)| {
                let doc = index.document(*doc_id)?;
                Some(SearchHit {
                    doc_id: *doc_id,
                    url: doc.url.clone(),
                    title: doc.title.clone(),
                    kind: doc.kind.clone(),
                    score: *score,
                    snippet: snippet::snippet(&doc.content, &terms, self.config.snippet_length),
                })
            })
            .collect();
        drop(index);

        let results = SearchResults {
            total: hits.len(),
            hits,
        };
        self.cache.lock().unwrap().put(key, results.clone());
        Ok(page(&results, pagination))
    }

    /// Terms present in the index whose prefix equals `partial`, ranked by
    /// document frequency descending.
    pub fn get_suggestions(&self, partial: &str, limit: usize) -> Vec<String> {
        let partial = partial.to_lowercase();
        let index = self.index.lock().unwrap();
        let mut candidates: Vec<(String, usize)> = index
            .documents()
            .flat_map(|doc| rednet_search_index::tokenize(&doc.title).into_iter().chain(rednet_search_index::tokenize(&doc.content)))
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .filter(|term| term.starts_with(&partial))
            .map(|term| {
                let df = index.df(&term);
                (term, df)
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        candidates.into_iter().take(limit).map(|(term, _)| term).collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().unwrap().stats()
    }

    pub fn save(&self) -> Result<(), SearchError> {
        self.index.lock().unwrap().save(&self.config.index_path)?;
        self.cache.lock().unwrap().save(&self.config.cache_export_path)?;
        Ok(())
    }

    fn invalidate_cache(&self) {
        *self.cache.lock().unwrap() = cache::ResultCache::new(self.config.cache_max_entries, self.config.cache_max_memory_bytes, self.config.cache_ttl);
    }
}

fn query_terms(node: &QueryNode) -> Vec<String> {
    match node {
        QueryNode::Term(term) => vec![term.clone()],
        QueryNode::Phrase(words) => words.clone(),
        QueryNode::Filter(_, _) => Vec::new(),
        QueryNode::Not(_) => Vec::new(),
        QueryNode::And(lhs, rhs) | QueryNode::Or(lhs, rhs) => {
            let mut terms = query_terms(lhs);
            terms.extend(query_terms(rhs));
            terms
        },
    }
}

fn page(results: &SearchResults, pagination: Pagination) -> SearchResults {
    let limit = if pagination.limit == 0 { results.hits.len() } else { pagination.limit };
    let hits = results.hits.iter().skip(pagination.offset).take(limit).cloned().collect();
    SearchResults {
        hits,
        total: results.total,
    }
}

#[async_trait]
impl WithStartAndShutdown for SearchEngine {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Periodically persists the index and the result cache export until
    /// shutdown, mirroring the background-loop shape every other
    /// component's `start` spawns.
    async fn start(&self) {
        if self.is_running() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let index = self.index.clone();
        let index_path = self.config.index_path.clone();
        let cache = self.cache.clone();
        let cache_path = self.config.cache_export_path.clone();
        let interval = self.config.persist_interval;
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = index.lock().unwrap().save(&index_path) {
                            warn!("periodic search index persistence failed: {e}");
                        }
                        if let Err(e) = cache.lock().unwrap().save(&cache_path) {
                            warn!("periodic search cache persistence failed: {e}");
                        }
                    },
                }
            }
            running.store(false, Ordering::SeqCst);
        });
        tokio::task::yield_now().await;
        info!("search engine started");
    }

    async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.save() {
            warn!("final search persistence failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn engine_in(dir: &std::path::Path) -> SearchEngine {
        let mut config = Config::default();
        config.index_path = dir.join("index.json");
        config.cache_export_path = dir.join("cache.json");
        SearchEngine::new(config)
    }

    #[test]
    fn search_ranks_and_snippets_results() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("shop.comp1.rednet/home", "Welcome", "the quick brown fox jumps over the lazy dog", "rwml");
        engine.add_document("news.comp2.rednet/home", "News", "brown bear sightings reported today", "rwml");

        let results = engine.search("brown", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();
        assert_eq!(results.hits.len(), 2);
        assert!(results.hits[0].snippet.to_lowercase().contains("brown"));
    }

    #[test]
    fn pagination_limits_and_offsets_results() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("a.rednet/1", "A", "shared term one", "rwml");
        engine.add_document("b.rednet/1", "B", "shared term two", "rwml");
        engine.add_document("c.rednet/1", "C", "shared term three", "rwml");

        let page1 = engine.search("shared", None, "relevance", Pagination { limit: 2, offset: 0 }).unwrap();
        let page2 = engine.search("shared", None, "relevance", Pagination { limit: 2, offset: 2 }).unwrap();
        assert_eq!(page1.hits.len(), 2);
        assert_eq!(page2.hits.len(), 1);
        assert_eq!(page1.total, 3);
    }

    #[test]
    fn cache_is_used_on_repeat_queries() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("a.rednet/1", "A", "cats and dogs", "rwml");

        engine.search("cats", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();
        engine.search("cats", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();
        let stats = engine.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn adding_a_document_invalidates_the_cache() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("a.rednet/1", "A", "cats everywhere", "rwml");
        engine.search("cats", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();

        engine.add_document("b.rednet/1", "B", "cats again", "rwml");
        let results = engine.search("cats", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();
        assert_eq!(results.hits.len(), 2);
        assert_eq!(engine.cache_stats().misses, 2);
    }

    #[test]
    fn suggestions_are_ranked_by_document_frequency() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("a.rednet/1", "A", "category catalog", "rwml");
        engine.add_document("b.rednet/1", "B", "category", "rwml");

        let suggestions = engine.get_suggestions("cat", 5);
        assert_eq!(suggestions.first().unwrap(), "category");
    }

    #[tokio::test]
    async fn start_then_shutdown_persists_the_index_to_disk() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("a.rednet/1", "A", "persisted content", "rwml");

        engine.start().await;
        engine.shutdown().await;

        let reloaded = SearchIndex::load(&engine.config.index_path).unwrap();
        assert_eq!(reloaded.total_documents(), 1);
    }

    #[test]
    fn save_also_persists_a_versioned_result_cache_export() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.add_document("a.rednet/1", "A", "cats and dogs", "rwml");
        engine.search("cats", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();

        engine.save().unwrap();

        let raw = std::fs::read_to_string(&engine.config.cache_export_path).unwrap();
        assert!(raw.contains("\"version\": \"1.0\""));

        let reloaded = SearchEngine::new({
            let mut config = Config::default();
            config.index_path = engine.config.index_path.clone();
            config.cache_export_path = engine.config.cache_export_path.clone();
            config
        });
        // Constructing a new engine already restores the cache export from
        // disk via `ResultCache::load` in `new`.
        assert_eq!(reloaded.cache_stats().misses, 1);
        reloaded.search("cats", None, "relevance", Pagination { limit: 10, offset: 0 }).unwrap();
    }
}
