//! FX rate caching with TTL support.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ratekeeper_common::{constants, is_within, CurrencyPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A resolved rate held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRate {
    pub rate: Decimal,
    /// Provider the rate came from.
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl CachedRate {
    fn is_fresh(&self, ttl: Duration) -> bool {
        is_within(self.observed_at, ttl, Utc::now())
    }
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Time-to-live shared by every pair.
    pub ttl: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::default_cache_ttl(),
        }
    }
}

/// Thread-safe rate cache with lazy expiry.
///
/// Entries are checked on read; there is no background sweep. Operations on
/// different pairs land on different shards and do not block each other.
pub struct RateCache {
    cache: DashMap<CurrencyPair, CachedRate>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get a rate from cache if still within its TTL.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, pair: &CurrencyPair) -> Option<CachedRate> {
        let ttl = self.config.ttl;

        if let Some(entry) = self.cache.get(pair) {
            if entry.is_fresh(ttl) {
                debug!(pair = %pair, "Cache hit");
                return Some(entry.value().clone());
            }
            drop(entry);

            // A concurrent put may have replaced the entry since we looked.
            if self.cache.remove_if(pair, |_, e| !e.is_fresh(ttl)).is_some() {
                debug!(pair = %pair, "Cache entry expired");
            }
        }

        debug!(pair = %pair, "Cache miss");
        None
    }

    /// Store a rate, overwriting any existing entry for the pair.
    pub fn put(&self, pair: CurrencyPair, rate: Decimal, source: impl Into<String>) {
        let entry = CachedRate {
            rate,
            source: source.into(),
            observed_at: Utc::now(),
        };
        self.cache.insert(pair, entry);
    }

    /// Clear all cached rates.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get the number of entries in cache, expired ones included.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total = self.cache.len();
        let valid = self
            .cache
            .iter()
            .filter(|e| e.is_fresh(self.config.ttl))
            .count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total.saturating_sub(valid),
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Shared rate cache.
pub type SharedRateCache = Arc<RateCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ratekeeper_common::Currency;
    use rust_decimal_macros::dec;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    fn pair(base: &str, target: &str) -> CurrencyPair {
        CurrencyPair::new(Currency::new(base), Currency::new(target))
    }

    fn short_lived(ms: i64) -> RateCache {
        RateCache::with_config(RateCacheConfig {
            ttl: Duration::milliseconds(ms),
        })
    }

    #[test]
    fn test_cache_put_and_get() {
        let cache = RateCache::new();
        cache.put(pair("USD", "EUR"), dec!(0.85), "alpha");

        let cached = cache.get(&pair("USD", "EUR")).unwrap();
        assert_eq!(cached.rate, dec!(0.85));
        assert_eq!(cached.source, "alpha");
    }

    #[test]
    fn test_cache_miss_is_exact_pair() {
        let cache = RateCache::new();
        cache.put(pair("USD", "EUR"), dec!(0.85), "alpha");

        assert!(cache.get(&pair("EUR", "USD")).is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let cache = RateCache::new();
        cache.put(pair("USD", "EUR"), dec!(0.85), "alpha");
        cache.put(pair("USD", "EUR"), dec!(0.86), "beta");

        assert_eq!(cache.len(), 1);
        let cached = cache.get(&pair("USD", "EUR")).unwrap();
        assert_eq!(cached.rate, dec!(0.86));
        assert_eq!(cached.source, "beta");
    }

    #[test]
    fn test_cache_expiry_removes_entry() {
        let cache = short_lived(50);
        cache.put(pair("USD", "EUR"), dec!(0.85), "alpha");

        // Should be valid immediately
        assert!(cache.get(&pair("USD", "EUR")).is_some());

        sleep(StdDuration::from_millis(60));

        assert_eq!(cache.stats().expired_entries, 1);
        assert!(cache.get(&pair("USD", "EUR")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear() {
        let cache = RateCache::new();
        cache.put(pair("USD", "EUR"), dec!(0.85), "alpha");
        cache.put(pair("GBP", "USD"), dec!(1.27), "alpha");

        assert_eq!(cache.len(), 2);

        cache.clear();

        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_concurrent_disjoint_pairs() {
        let cache = Arc::new(RateCache::new());
        let handles: Vec<_> = ["EUR", "GBP", "JPY", "CHF"]
            .into_iter()
            .map(|target| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 1..=100u32 {
                        cache.put(pair("USD", target), Decimal::from(i), "alpha");
                        assert!(cache.get(&pair("USD", target)).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 4);
        assert_eq!(cache.get(&pair("USD", "JPY")).unwrap().rate, dec!(100));
    }

    proptest! {
        #[test]
        fn prop_put_then_get_returns_rate(mantissa in 1i64..1_000_000_000, scale in 0u32..10) {
            let cache = RateCache::new();
            let rate = Decimal::new(mantissa, scale);
            cache.put(pair("USD", "EUR"), rate, "alpha");
            prop_assert_eq!(cache.get(&pair("USD", "EUR")).map(|c| c.rate), Some(rate));
        }
    }
}
