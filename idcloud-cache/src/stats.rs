//! Cache statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of one cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of writes.
    pub puts: u64,
    /// Number of reads served from the cache.
    pub hits: u64,
    /// Number of reads not served, expired entries included.
    pub misses: u64,
    /// Number of reads that found an expired entry.
    pub expirations: u64,
    /// Number of entries written as new and not yet removed.
    pub size: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Live counters shared between a cache and its observers.
#[derive(Debug, Default)]
pub struct StatsCounter {
    puts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    size: AtomicU64,
}

impl StatsCounter {
    pub fn record_put(&self, is_new: bool) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if is_new {
            self.size.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, expired: bool) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        if expired {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_delete(&self) {
        let _ = self
            .size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }

    pub fn record_clear(&self) {
        self.size.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            puts: self.puts.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: self.size.load(Ordering::Relaxed),
        }
    }
}
