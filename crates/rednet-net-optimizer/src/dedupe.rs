//! Request deduplication (spec §4.2). A request's hash
//! (`type|url|method|params`) is remembered for `dedupe_window`; a second
//! request with the same hash inside that window is dropped. Non-request
//! messages are never deduped — callers simply don't hash them.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use std::collections::hash_map::DefaultHasher;

/// The fields that make a request a candidate for deduplication.
#[derive(Debug, Clone, Hash)]
pub struct RequestKey<'a> {
    pub kind: &'a str,
    pub url: &'a str,
    pub method: &'a str,
    pub params: &'a str,
}

impl<'a> RequestKey<'a> {
    pub fn hash_value(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

struct Entry {
    hash: u64,
    seen_at: Instant,
}

pub struct Dedupe {
    window: Duration,
    capacity: usize,
    seen: Mutex<VecDeque<Entry>>,
}

impl Dedupe {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity,
            seen: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Returns `true` if `hash` was already observed within the dedupe
    /// window (i.e. this request should be dropped as a duplicate).
    /// Otherwise records it and returns `false`.
    pub fn check_and_record(&self, hash: u64) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap();

        while let Some(front) = seen.front() {
            if now.duration_since(front.seen_at) > self.window {
                seen.pop_front();
            } else {
                break;
            }
        }

        if seen.iter().any(|e| e.hash == hash) {
            return true;
        }

        if seen.len() >= self.capacity {
            seen.pop_front();
        }
        seen.push_back(Entry { hash, seen_at: now });
        false
    }
}
