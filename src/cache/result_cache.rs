//! TTL cache of query outcomes.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::types::{Query, QueryResult};

/// A stored outcome and its validity window.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: QueryResult,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Valid iff `now - stored_at < ttl`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Counts taken at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

/// A thread-safe cache keyed by `(network, address)`.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<DashMap<Query, CacheEntry>>,
    success_ttl: Duration,
    failure_ttl: Duration,
}

impl ResultCache {
    pub fn new(success_ttl: Duration, failure_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            success_ttl,
            failure_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.success_ttl_secs),
            Duration::from_secs(config.failure_ttl_secs),
        )
    }

    /// Return the stored result if it is still valid. Expired entries are
    /// treated as absent but left for `sweep`.
    pub fn get(&self, key: &Query) -> Option<QueryResult> {
        let now = Instant::now();
        let hit = self
            .inner
            .get(key)
            .filter(|entry| entry.is_valid_at(now))
            .map(|entry| entry.result.clone());
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Store `result`, choosing the TTL from its outcome.
    pub fn put(&self, result: QueryResult) {
        let ttl = if result.error_kind.is_some() {
            self.failure_ttl
        } else {
            self.success_ttl
        };
        let key = result.query();
        self.inner.insert(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
                ttl,
            },
        );
        metrics::record_cache_size(self.inner.len());
    }

    pub fn remove(&self, key: &Query) -> Option<QueryResult> {
        self.inner.remove(key).map(|(_, entry)| entry.result)
    }

    /// Physically drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_valid_at(now));
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.inner.len(), "Swept expired cache entries");
        }
        metrics::record_cache_size(self.inner.len());
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut valid = 0;
        let mut expired = 0;
        for r in self.inner.iter() {
            if r.value().is_valid_at(now) {
                valid += 1;
            } else {
                expired += 1;
            }
        }
        CacheStats {
            total: valid + expired,
            valid,
            expired,
        }
    }

    pub fn clear(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ErrorKind;

    fn success(address: &str) -> QueryResult {
        let q = Query::new("ethereum", address);
        let mut r = QueryResult::failed(&q, "ETH", ErrorKind::Unknown, String::new());
        r.error_kind = None;
        r.error_message = None;
        r.display_balance = 1.0;
        r
    }

    fn failure(address: &str) -> QueryResult {
        QueryResult::failed(&Query::new("ethereum", address), "ETH", ErrorKind::ServerError, "x".into())
    }

    fn cache() -> ResultCache {
        ResultCache::new(Duration::from_secs(300), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_ttl() {
        let cache = cache();
        cache.put(success("0x1"));
        let key = Query::new("ethereum", "0x1");

        assert!(cache.get(&key).is_some());
        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get(&key).is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_ttl_is_short() {
        let cache = cache();
        cache.put(failure("0x2"));
        let key = Query::new("ethereum", "0x2");

        assert!(cache.get(&key).is_some());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cache.get(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_and_sweep() {
        let cache = cache();
        cache.put(success("0x1"));
        cache.put(failure("0x2"));
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(cache.stats(), CacheStats { total: 2, valid: 1, expired: 1 });
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stats(), CacheStats { total: 1, valid: 1, expired: 0 });

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_entry() {
        let cache = cache();
        cache.put(failure("0x3"));
        cache.put(success("0x3"));
        let got = cache.get(&Query::new("ethereum", "0x3")).unwrap();
        assert!(got.is_success());
        assert_eq!(cache.len(), 1);
    }
}
