//! Page cache (spec §4.5): TTL'd, size-bounded, oldest-evicted-first.

use std::collections::HashMap;
use std::time::Duration;

use rednet_types::{now_ms, Timestamp};

#[derive(Debug, Clone)]
pub struct CachedPage {
    pub content: Vec<u8>,
    pub content_type: String,
    pub stored_at: Timestamp,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PageCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct PageCache {
    ttl: Duration,
    max_size: usize,
    current_size: usize,
    entries: HashMap<String, CachedPage>,
    stats: PageCacheStats,
}

impl PageCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            max_size,
            current_size: 0,
            entries: HashMap::new(),
            stats: PageCacheStats::default(),
        }
    }

    pub fn stats(&self) -> PageCacheStats {
        self.stats
    }

    pub fn get(&mut self, url: &str) -> Option<CachedPage> {
        let now = now_ms();
        match self.entries.get(url) {
            Some(page) if now.saturating_sub(page.stored_at) < self.ttl.as_millis() as Timestamp => {
                self.stats.hits += 1;
                Some(page.clone())
            },
            Some(page) => {
                self.current_size = self.current_size.saturating_sub(page.content.len());
                self.entries.remove(url);
                self.stats.misses += 1;
                self.stats.evictions += 1;
                None
            },
            None => {
                self.stats.misses += 1;
                None
            },
        }
    }

    /// Evicts the oldest live entries until `current_size + new_len` fits,
    /// then stores the page. A single page larger than `max_size` is never
    /// stored (spec invariant: counters stay consistent with live entries).
    pub fn set(&mut self, url: &str, content: Vec<u8>, content_type: &str) {
        let new_len = content.len();
        if new_len > self.max_size {
            return;
        }
        while self.current_size + new_len > self.max_size {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, page)| page.stored_at)
                .map(|(url, _)| url.clone())
            else {
                break;
            };
            if let Some(page) = self.entries.remove(&oldest) {
                self.current_size = self.current_size.saturating_sub(page.content.len());
                self.stats.evictions += 1;
            }
        }

        if let Some(existing) = self.entries.remove(url) {
            self.current_size = self.current_size.saturating_sub(existing.content.len());
        }
        self.current_size += new_len;
        self.entries.insert(
            url.to_string(),
            CachedPage {
                content,
                content_type: content_type.to_string(),
                stored_at: now_ms(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
        self.stats = PageCacheStats::default();
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache_counts_a_miss() {
        let mut cache = PageCache::new(1024, Duration::from_secs(60));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_get() {
        let mut cache = PageCache::new(1024, Duration::from_millis(0));
        cache.set("a", vec![1, 2, 3], "text/html");
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn set_evicts_oldest_to_respect_max_size() {
        let mut cache = PageCache::new(10, Duration::from_secs(60));
        cache.set("a", vec![0; 6], "text/html");
        std::thread::sleep(Duration::from_millis(2));
        cache.set("b", vec![0; 6], "text/html");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn clear_resets_counters() {
        let mut cache = PageCache::new(1024, Duration::from_secs(60));
        cache.set("a", vec![0; 4], "text/html");
        cache.clear();
        assert_eq!(cache.current_size(), 0);
        assert_eq!(cache.stats().hits, 0);
    }
}
