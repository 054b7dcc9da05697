//! Persistent sample store seam and an in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use ratekeeper_common::{CurrencyPair, RateSample};

use crate::error::FxResult;

/// Append-only store of historical rate samples.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Persist one sample.
    async fn insert(&self, sample: &RateSample) -> FxResult<()>;

    /// Persist several samples, returning how many were written.
    async fn insert_all(&self, samples: &[RateSample]) -> FxResult<u64> {
        for sample in samples {
            self.insert(sample).await?;
        }
        Ok(samples.len() as u64)
    }

    /// Samples for `pair` observed in `[from, to]`, oldest first.
    async fn query_range(
        &self,
        pair: &CurrencyPair,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FxResult<Vec<RateSample>>;

    /// Delete every sample observed before `cutoff`, returning the count.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> FxResult<u64>;
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct InMemoryRateStore {
    samples: RwLock<Vec<RateSample>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn insert(&self, sample: &RateSample) -> FxResult<()> {
        self.samples.write().push(sample.clone());
        Ok(())
    }

    async fn query_range(
        &self,
        pair: &CurrencyPair,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FxResult<Vec<RateSample>> {
        let mut matching: Vec<RateSample> = self
            .samples
            .read()
            .iter()
            .filter(|s| {
                s.base == pair.base
                    && s.target == pair.target
                    && s.observed_at >= from
                    && s.observed_at <= to
            })
            .cloned()
            .collect();

        matching.sort_by_key(|s| s.observed_at);
        Ok(matching)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> FxResult<u64> {
        let mut samples = self.samples.write();
        let before = samples.len();
        samples.retain(|s| s.observed_at >= cutoff);
        Ok((before - samples.len()) as u64)
    }
}
