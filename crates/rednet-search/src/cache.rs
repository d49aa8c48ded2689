//! Result cache (spec §4.11 "Result cache"): normalized-key lookup with a
//! TTL, an LRU eviction policy bounded by both entry count and aggregate
//! byte size, and hit/miss/eviction statistics.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use lru::LruCache;
use rednet_types::config::resolve_path;
use rednet_types::{now_ms, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::SearchResults;

/// On-disk format version for [`ResultCache::export`] (spec §6: "Search
/// result cache export (versioned `{entries, statistics, version:"1.0"}`)").
pub const CACHE_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    results: SearchResults,
    inserted_at: Timestamp,
    size_bytes: usize,
}

pub struct ResultCache {
    entries: LruCache<String, Entry>,
    ttl: Duration,
    max_memory_bytes: usize,
    current_memory_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// The versioned export shape spec §6 requires for the result cache:
/// `{entries, statistics, version}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheExport {
    entries: Vec<(String, Entry)>,
    statistics: CacheStats,
    version: String,
}

impl ResultCache {
    pub fn new(max_entries: usize, max_memory_bytes: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            entries: LruCache::new(capacity),
            ttl,
            max_memory_bytes,
            current_memory_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn key(query: &str, category: Option<&str>, sort: &str, limit: usize) -> String {
        format!("{}|{}|{}|{}", query, category.unwrap_or(""), sort, limit)
    }

    pub fn get(&mut self, key: &str) -> Option<SearchResults> {
        let expired = self.entries.get(key).is_some_and(|entry| now_ms().saturating_sub(entry.inserted_at) > self.ttl.as_millis() as u64);
        if expired {
            if let Some(entry) = self.entries.pop(key) {
                self.current_memory_bytes = self.current_memory_bytes.saturating_sub(entry.size_bytes);
            }
        }

        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.results.clone())
            },
            None => {
                self.misses += 1;
                None
            },
        }
    }

    pub fn put(&mut self, key: String, results: SearchResults) {
        let size_bytes = serde_json::to_vec(&results).map(|bytes| bytes.len()).unwrap_or(0);
        let entry = Entry {
            results,
            inserted_at: now_ms(),
            size_bytes,
        };

        if let Some(evicted) = self.entries.push(key.clone(), entry) {
            let (evicted_key, evicted_entry) = evicted;
            if evicted_key != key {
                self.current_memory_bytes = self.current_memory_bytes.saturating_sub(evicted_entry.size_bytes);
                self.evictions += 1;
            }
        }
        self.current_memory_bytes += size_bytes;

        while self.current_memory_bytes > self.max_memory_bytes {
            match self.entries.pop_lru() {
                Some((_, entry)) => {
                    self.current_memory_bytes = self.current_memory_bytes.saturating_sub(entry.size_bytes);
                    self.evictions += 1;
                },
                None => break,
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    /// Snapshots entries (most-recently-used first) and statistics into the
    /// versioned export shape spec §6 requires for the result cache.
    pub fn export(&self) -> CacheExport {
        CacheExport {
            entries: self.entries.iter().map(|(key, entry)| (key.clone(), entry.clone())).collect(),
            statistics: self.stats(),
            version: CACHE_FORMAT_VERSION.to_string(),
        }
    }

    /// Restores entries and statistics from a previous [`export`](Self::export).
    /// Entries are re-inserted LRU-oldest-first so the resulting recency
    /// order matches the one that was exported.
    pub fn import(&mut self, export: CacheExport) {
        for (key, entry) in export.entries.into_iter().rev() {
            self.current_memory_bytes += entry.size_bytes;
            self.entries.push(key, entry);
        }
        self.hits = export.statistics.hits;
        self.misses = export.statistics.misses;
        self.evictions = export.statistics.evictions;
    }

    pub fn save(&self, path: &Path) -> Result<(), SearchError> {
        let resolved = resolve_path(path).map_err(|e| SearchError::CachePersistence(e.to_string()))?;
        let data = serde_json::to_string_pretty(&self.export()).map_err(|e| SearchError::CachePersistence(e.to_string()))?;
        std::fs::write(resolved, data).map_err(|e| SearchError::CachePersistence(e.to_string()))
    }

    pub fn load(&mut self, path: &Path) -> Result<(), SearchError> {
        let data = std::fs::read_to_string(path).map_err(|e| SearchError::CachePersistence(e.to_string()))?;
        let export: CacheExport = serde_json::from_str(&data).map_err(|e| SearchError::CachePersistence(e.to_string()))?;
        self.import(export);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sample_results() -> SearchResults {
        SearchResults::default()
    }

    #[test]
    fn miss_then_hit_updates_stats() {
        let mut cache = ResultCache::new(10, 1_000_000, Duration::from_secs(60));
        let key = ResultCache::key("cats", None, "relevance", 10);
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), sample_results());
        assert!(cache.get(&key).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn entries_beyond_max_count_are_evicted() {
        let mut cache = ResultCache::new(1, 1_000_000, Duration::from_secs(60));
        cache.put(ResultCache::key("a", None, "relevance", 10), sample_results());
        cache.put(ResultCache::key("b", None, "relevance", 10), sample_results());

        assert!(cache.get(&ResultCache::key("a", None, "relevance", 10)).is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn expired_entries_are_treated_as_a_miss() {
        let mut cache = ResultCache::new(10, 1_000_000, Duration::from_millis(0));
        let key = ResultCache::key("cats", None, "relevance", 10);
        cache.put(key.clone(), sample_results());

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn export_carries_the_documented_version_and_round_trips_in_memory() {
        let mut cache = ResultCache::new(10, 1_000_000, Duration::from_secs(60));
        let key = ResultCache::key("cats", None, "relevance", 10);
        cache.put(key.clone(), sample_results());
        cache.get(&key);
        cache.get(&ResultCache::key("missing", None, "relevance", 10));

        let export = cache.export();
        assert_eq!(export.version, CACHE_FORMAT_VERSION);
        assert_eq!(export.statistics.hits, 1);
        assert_eq!(export.statistics.misses, 1);
        assert_eq!(export.entries.len(), 1);

        let mut restored = ResultCache::new(10, 1_000_000, Duration::from_secs(60));
        restored.import(export);
        assert!(restored.get(&key).is_some());
        assert_eq!(restored.stats().evictions, 0);
    }

    #[test]
    fn save_and_load_round_trip_through_disk_with_a_version_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = ResultCache::new(10, 1_000_000, Duration::from_secs(60));
        cache.put(ResultCache::key("cats", None, "relevance", 10), sample_results());
        cache.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"version\": \"1.0\""));

        let mut reloaded = ResultCache::new(10, 1_000_000, Duration::from_secs(60));
        reloaded.load(&path).unwrap();
        assert!(reloaded.get(&ResultCache::key("cats", None, "relevance", 10)).is_some());
    }
}
