//! Statistics for tree mutations and registry lookups.
//!
//! All counters are `AtomicU64` with relaxed ordering; they are monotonic
//! counters read for monitoring, not used for synchronization.
//!
//! ```
//! use objdav_tree::stats::TreeStats;
//! use std::time::Duration;
//!
//! let stats = TreeStats::new();
//! stats.record_copy();
//! stats.record_latency(Duration::from_millis(3));
//! assert_eq!(stats.snapshot().copies, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Statistics for operation latency.
#[derive(Debug, Default)]
pub struct LatencyStats {
    /// Total nanoseconds across all operations.
    total_nanos: AtomicU64,
    /// Number of operations recorded.
    count: AtomicU64,
}

impl LatencyStats {
    /// Record a latency measurement.
    #[inline]
    pub fn record(&self, elapsed: Duration) {
        #[allow(clippy::cast_possible_truncation)]
        let nanos = elapsed.as_nanos() as u64;
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of operations recorded.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average latency in microseconds, 0.0 if nothing was recorded.
    pub fn avg_micros(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_nanos.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }
}

/// Counters for the tree mutator and node registry.
#[derive(Debug, Default)]
pub struct TreeStats {
    copies: AtomicU64,
    moves: AtomicU64,
    renames: AtomicU64,
    errors: AtomicU64,
    registry_hits: AtomicU64,
    registry_misses: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    latency: LatencyStats,
}

impl TreeStats {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy reached the backend and succeeded.
    #[inline]
    pub fn record_copy(&self) {
        self.copies.fetch_add(1, Ordering::Relaxed);
    }

    /// A cross-directory move succeeded.
    #[inline]
    pub fn record_move(&self) {
        self.moves.fetch_add(1, Ordering::Relaxed);
    }

    /// An in-place rename succeeded.
    #[inline]
    pub fn record_rename(&self) {
        self.renames.fetch_add(1, Ordering::Relaxed);
    }

    /// An operation failed.
    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A path was found in the registry.
    #[inline]
    pub fn record_hit(&self) {
        self.registry_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A path had to be loaded from the store.
    #[inline]
    pub fn record_miss(&self) {
        self.registry_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A directory's `children_fetched` flag was cleared.
    #[inline]
    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// `count` cached nodes were evicted from the registry.
    #[inline]
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record the wall time of a copy or move.
    #[inline]
    pub fn record_latency(&self, elapsed: Duration) {
        self.latency.record(elapsed);
    }

    /// Fraction of registry lookups served from cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.registry_hits.load(Ordering::Relaxed);
        let total = hits + self.registry_misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> TreeStatsSnapshot {
        TreeStatsSnapshot {
            copies: self.copies.load(Ordering::Relaxed),
            moves: self.moves.load(Ordering::Relaxed),
            renames: self.renames.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            registry_hits: self.registry_hits.load(Ordering::Relaxed),
            registry_misses: self.registry_misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            operations_timed: self.latency.count(),
            avg_latency_micros: self.latency.avg_micros(),
        }
    }
}

/// Plain-value copy of [`TreeStats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeStatsSnapshot {
    /// Successful copies.
    pub copies: u64,
    /// Successful cross-directory moves.
    pub moves: u64,
    /// Successful renames.
    pub renames: u64,
    /// Failed operations.
    pub errors: u64,
    /// Registry lookups served from cache.
    pub registry_hits: u64,
    /// Registry lookups that went to the store.
    pub registry_misses: u64,
    /// `children_fetched` flags cleared.
    pub invalidations: u64,
    /// Nodes evicted from the registry.
    pub evictions: u64,
    /// Operations with a recorded latency.
    pub operations_timed: u64,
    /// Average latency in microseconds.
    pub avg_latency_micros: f64,
}
