//! Counters for engine monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine metrics.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Lookups answered from the cache.
    pub cache_hits: AtomicU64,
    /// Lookups that had to go to providers.
    pub cache_misses: AtomicU64,
    /// Individual provider calls that failed.
    pub provider_failures: AtomicU64,
    /// Aggregation passes where every provider failed.
    pub aggregation_failures: AtomicU64,
    /// Completed refreshes.
    pub refreshes: AtomicU64,
    /// Samples written to the store.
    pub samples_written: AtomicU64,
    /// Samples removed by retention cleanup.
    pub samples_purged: AtomicU64,
}

impl EngineMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_failed(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn aggregation_failed(&self) {
        self.aggregation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refreshed(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_written(&self, count: u64) {
        self.samples_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn samples_purged(&self, count: u64) {
        self.samples_purged.fetch_add(count, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            aggregation_failures: self.aggregation_failures.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            samples_purged: self.samples_purged.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub provider_failures: u64,
    pub aggregation_failures: u64,
    pub refreshes: u64,
    pub samples_written: u64,
    pub samples_purged: u64,
}

impl MetricsSnapshot {
    /// Share of lookups served from the cache, in `[0, 1]`.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = EngineMetrics::new();

        metrics.cache_hit();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.cache_miss();
        metrics.samples_written(5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.samples_written, 5);
        assert!((snapshot.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_ratio_without_lookups() {
        assert_eq!(MetricsSnapshot::default().hit_ratio(), 0.0);
    }
}
