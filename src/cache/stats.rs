//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! approximate stored size.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// == Cache Stats ==
/// Point-in-time snapshot of cache performance metrics.
///
/// A plain record returned by [`Cache::stat`](crate::Cache::stat); callers
/// never mutate it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries removed because their TTL elapsed
    pub evictions: u64,
    /// Hit percentage, `hits / (hits + misses) * 100`, or 0 with no reads
    pub hit_rate: f64,
    /// Approximate number of bytes currently stored
    pub size_bytes: u64,
}

// == Counters ==
/// Live counters behind the stats snapshot.
///
/// Atomic so the hit/miss bookkeeping can run on the shared-lock read path;
/// size accounting only changes under the exclusive lock but lives here for
/// uniform access.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    size_bytes: AtomicU64,
}

impl Counters {
    // == Record Hit ==
    /// Increments the hit counter.
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    // == Size Accounting ==
    /// Charges `bytes` against the stored-size figure.
    pub(crate) fn add_bytes(&self, bytes: u64) {
        self.size_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Credits `bytes` back to the stored-size figure.
    pub(crate) fn sub_bytes(&self, bytes: u64) {
        self.size_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Returns the current figures as a plain [`CacheStats`] record.
    pub(crate) fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
        }
    }
}
