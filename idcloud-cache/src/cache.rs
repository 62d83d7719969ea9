//! TTL/TTI cache over a single store.
//!
//! The cache is soft: reads never fail for a missing or expired key, and
//! there is no locking across operations. Two reads racing a delete may both
//! see the old value.

use std::sync::Arc;

use idcloud_core::{IdCloudResult, DEFAULT_TTI_SECS, DEFAULT_TTL_SECS};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::entry::CacheEntry;
use crate::stats::{CacheStats, StatsCounter};
use crate::store::{CacheStore, DisabledStore};

/// A cache region: one store plus expiry limits and statistics.
#[derive(Debug, Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    /// Seconds since creation before an entry expires.
    ttl: u64,
    /// Seconds since last access before an entry expires.
    tti: u64,
    stats: Arc<StatsCounter>,
    clock: Arc<dyn Clock>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: u64, tti: u64) -> Self {
        Self {
            store,
            ttl,
            tti,
            stats: Arc::new(StatsCounter::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// A cache that never holds anything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledStore), DEFAULT_TTL_SECS, DEFAULT_TTI_SECS)
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn tti(&self) -> u64 {
        self.tti
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Shared handle to the live counters.
    pub fn stats_counter(&self) -> Arc<StatsCounter> {
        Arc::clone(&self.stats)
    }

    /// Look up `key`.
    ///
    /// Returns `Ok(None)` on a miss or when the entry has expired (the expired
    /// entry is removed). A hit refreshes the access time when `ttl != tti`;
    /// failure to persist that refresh is ignored. Store errors are counted
    /// as misses and returned.
    pub async fn get(&self, key: &str) -> IdCloudResult<Option<Value>> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.stats.record_miss(false);
                return Ok(None);
            }
            Err(e) => {
                self.stats.record_miss(false);
                return Err(e);
            }
        };

        let now = self.clock.now();
        if entry.is_expired_at(self.ttl, self.tti, now) {
            self.stats.record_miss(true);
            match self.store.delete(key).await {
                Ok(true) => self.stats.record_delete(),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(error = %e, key, "Failed to evict expired cache entry");
                }
            }
            return Ok(None);
        }

        self.stats.record_hit();
        if self.ttl != self.tti {
            let mut touched = entry.clone();
            touched.touch_at(now);
            if let Err(e) = self.store.set(key, touched).await {
                tracing::debug!(error = %e, key, "Failed to refresh cache entry access time");
            }
        }
        Ok(Some(entry.into_value()))
    }

    /// Store `value` under `key` with a fresh creation time.
    ///
    /// Always overwrites, so every put restarts the time-to-live window.
    /// `is_new` only feeds the size statistic.
    pub async fn put(&self, key: &str, value: Value, is_new: bool) -> IdCloudResult<()> {
        let entry = CacheEntry::new_at(value, self.clock.now());
        self.store.set(key, entry).await?;
        self.stats.record_put(is_new);
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> IdCloudResult<()> {
        if self.store.delete(key).await? {
            self.stats.record_delete();
        }
        Ok(())
    }

    pub async fn clear(&self) -> IdCloudResult<()> {
        self.store.clear().await?;
        self.stats.record_clear();
        Ok(())
    }

    /// Number of entries currently held by the store.
    pub async fn size(&self) -> IdCloudResult<usize> {
        self.store.size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};
    use idcloud_core::{CacheError, IdCloudError};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Utc::now())))
        }

        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().expect("clock lock");
            *now += TimeDelta::seconds(secs);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().expect("clock lock")
        }
    }

    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, _key: &str) -> IdCloudResult<Option<CacheEntry>> {
            Err(CacheError::Store {
                store: "failing".to_string(),
                reason: "down".to_string(),
            }
            .into())
        }

        async fn set(&self, _key: &str, _entry: CacheEntry) -> IdCloudResult<()> {
            Err(CacheError::Store {
                store: "failing".to_string(),
                reason: "read-only".to_string(),
            }
            .into())
        }

        async fn delete(&self, _key: &str) -> IdCloudResult<bool> {
            Ok(false)
        }

        async fn clear(&self) -> IdCloudResult<()> {
            Ok(())
        }

        async fn size(&self) -> IdCloudResult<usize> {
            Ok(0)
        }
    }

    fn memory_cache(ttl: u64, tti: u64, clock: Arc<FixedClock>) -> Cache {
        Cache::new(Arc::new(MemoryStore::new()), ttl, tti).with_clock(clock)
    }

    #[tokio::test]
    async fn test_put_then_get_returns_value() {
        let cache = memory_cache(300, 300, FixedClock::new());
        let value = json!({"href": "/accounts/1", "email": "a@b.com"});
        cache.put("/accounts/1", value.clone(), true).await.expect("put");

        let cached = cache.get("/accounts/1").await.expect("get");
        assert_eq!(cached, Some(value));

        let stats = cache.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_miss_counts() {
        let cache = memory_cache(300, 300, FixedClock::new());
        assert_eq!(cache.get("/nothing").await.expect("get"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 0);
    }

    #[tokio::test]
    async fn test_expired_by_ttl_is_evicted() {
        let clock = FixedClock::new();
        let cache = memory_cache(10, 10, Arc::clone(&clock));
        cache.put("k", json!(1), true).await.expect("put");

        clock.advance(10);
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert_eq!(cache.size().await.expect("size"), 0);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test]
    async fn test_reads_extend_idle_window() {
        let clock = FixedClock::new();
        let cache = memory_cache(100, 10, Arc::clone(&clock));
        cache.put("k", json!("v"), true).await.expect("put");

        for _ in 0..5 {
            clock.advance(8);
            assert_eq!(cache.get("k").await.expect("get"), Some(json!("v")));
        }

        clock.advance(10);
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_equal_ttl_and_tti_do_not_refresh() {
        let clock = FixedClock::new();
        let cache = memory_cache(10, 10, Arc::clone(&clock));
        cache.put("k", json!("v"), true).await.expect("put");

        clock.advance(8);
        assert!(cache.get("k").await.expect("get").is_some());
        clock.advance(2);
        assert!(cache.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_put_restarts_ttl_even_when_not_new() {
        let clock = FixedClock::new();
        let cache = memory_cache(10, 100, Arc::clone(&clock));
        cache.put("k", json!(1), true).await.expect("put");

        clock.advance(8);
        cache.put("k", json!(2), false).await.expect("put");
        clock.advance(8);
        assert_eq!(cache.get("k").await.expect("get"), Some(json!(2)));

        let stats = cache.stats();
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = memory_cache(300, 300, FixedClock::new());
        cache.put("a", json!(1), true).await.expect("put");
        cache.put("b", json!(2), true).await.expect("put");

        cache.delete("a").await.expect("delete");
        assert_eq!(cache.get("a").await.expect("get"), None);
        assert_eq!(cache.stats().size, 1);

        cache.clear().await.expect("clear");
        assert_eq!(cache.size().await.expect("size"), 0);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_store_error_is_returned_and_counted() {
        let cache = Cache::new(Arc::new(FailingStore), 300, 300);
        let err = cache.get("k").await.expect_err("store failure surfaces");
        assert!(matches!(err, IdCloudError::Cache(_)));
        assert_eq!(cache.stats().misses, 1);

        assert!(cache.put("k", json!(1), true).await.is_err());
        assert_eq!(cache.stats().puts, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = Cache::disabled();
        cache.put("k", json!(1), true).await.expect("put");
        assert_eq!(cache.get("k").await.expect("get"), None);
        cache.delete("k").await.expect("delete");
        assert_eq!(cache.store_name(), "disabled");
    }
}
