// Bounded workflow report cache: LRU eviction plus optional TTL

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::WorkflowReport;
use crate::config::OrchestratorConfig;

struct CachedReport {
    report: Arc<WorkflowReport>,
    stored_at: Instant,
}

pub struct WorkflowCache {
    entries: Mutex<LruCache<String, CachedReport>>,
    ttl: Option<Duration>,
}

/// Hex SHA-256 of the query text
pub fn cache_key(query: &str) -> String {
    hex::encode(Sha256::digest(query.as_bytes()))
}

impl WorkflowCache {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl())
    }

    pub async fn get(&self, query: &str) -> Option<Arc<WorkflowReport>> {
        let key = cache_key(query);
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(&key) {
            Some(entry) => self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl),
            None => return None,
        };
        if expired {
            debug!(key = %key, "Evicting expired workflow report");
            entries.pop(&key);
            return None;
        }
        entries.get(&key).map(|entry| Arc::clone(&entry.report))
    }

    pub async fn insert(&self, query: &str, report: Arc<WorkflowReport>) {
        let entry = CachedReport {
            report,
            stored_at: Instant::now(),
        };
        if let Some((evicted, _)) = self.entries.lock().await.push(cache_key(query), entry) {
            debug!(key = %evicted, "Workflow cache entry replaced or evicted");
        }
    }

    /// Returns how many reports were dropped
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        entries.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for WorkflowCache {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(summary: &str) -> Arc<WorkflowReport> {
        Arc::new(WorkflowReport {
            summary: summary.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_cache_key_is_sha256_hex() {
        assert_eq!(
            cache_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_hit_returns_same_arc() {
        let cache = WorkflowCache::new(4, None);
        let stored = report("s");
        cache.insert("q", stored.clone()).await;

        let hit = cache.get("q").await.unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
        assert!(cache.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = WorkflowCache::new(2, None);
        cache.insert("a", report("a")).await;
        cache.insert("b", report("b")).await;
        cache.get("a").await;
        cache.insert("c", report("c")).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one() {
        let cache = WorkflowCache::new(0, None);
        cache.insert("a", report("a")).await;
        cache.insert("b", report("b")).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = WorkflowCache::new(4, Some(Duration::from_secs(60)));
        cache.insert("q", report("s")).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cache.get("q").await.is_some());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get("q").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = WorkflowCache::default();
        cache.insert("a", report("a")).await;
        cache.insert("b", report("b")).await;
        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.clear().await, 0);
    }
}
