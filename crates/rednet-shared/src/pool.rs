//! Connection pool (spec §4.5): bounded per-host, idle-pruned, reused.

use std::collections::HashMap;
use std::time::Duration;

use rednet_types::{now_ms, Timestamp};

#[derive(Debug, Clone)]
pub struct PooledConnection {
    pub id: u64,
    pub host: String,
    pub last_used: Timestamp,
}

pub struct ConnectionPool {
    max_per_domain: usize,
    idle_timeout: Duration,
    connections: HashMap<String, Vec<PooledConnection>>,
    next_id: u64,
}

impl ConnectionPool {
    pub fn new(max_per_domain: usize, idle_timeout: Duration) -> Self {
        Self {
            max_per_domain,
            idle_timeout,
            connections: HashMap::new(),
            next_id: 0,
        }
    }

    /// Prune expired connections for `host`, then reuse one if available or
    /// create a new one if under the per-host cap (spec §4.5).
    pub fn get_connection(&mut self, host: &str) -> PooledConnection {
        self.prune(host);

        let bucket = self.connections.entry(host.to_string()).or_default();
        if bucket.len() < self.max_per_domain {
            self.next_id += 1;
            let conn = PooledConnection {
                id: self.next_id,
                host: host.to_string(),
                last_used: now_ms(),
            };
            bucket.push(conn.clone());
            return conn;
        }

        let reused = bucket
            .iter_mut()
            .min_by_key(|c| c.last_used)
            .expect("bucket is non-empty: max_per_domain >= 1 and len == max_per_domain");
        reused.last_used = now_ms();
        reused.clone()
    }

    fn prune(&mut self, host: &str) {
        let now = now_ms();
        let timeout = self.idle_timeout.as_millis() as Timestamp;
        if let Some(bucket) = self.connections.get_mut(host) {
            bucket.retain(|c| now.saturating_sub(c.last_used) < timeout);
        }
    }

    pub fn active_count(&self, host: &str) -> usize {
        self.connections.get(host).map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_new_connections_up_to_the_cap() {
        let mut pool = ConnectionPool::new(2, Duration::from_secs(60));
        let a = pool.get_connection("example.rednet");
        let b = pool.get_connection("example.rednet");
        assert_ne!(a.id, b.id);
        assert_eq!(pool.active_count("example.rednet"), 2);
    }

    #[test]
    fn reuses_the_least_recently_used_connection_once_at_cap() {
        let mut pool = ConnectionPool::new(1, Duration::from_secs(60));
        let a = pool.get_connection("example.rednet");
        let b = pool.get_connection("example.rednet");
        assert_eq!(a.id, b.id);
        assert_eq!(pool.active_count("example.rednet"), 1);
    }

    #[test]
    fn prunes_idle_connections_before_counting_the_cap() {
        let mut pool = ConnectionPool::new(1, Duration::from_millis(0));
        pool.get_connection("example.rednet");
        std::thread::sleep(Duration::from_millis(5));
        let second = pool.get_connection("example.rednet");
        assert_eq!(second.id, 2);
        assert_eq!(pool.active_count("example.rednet"), 1);
    }
}
