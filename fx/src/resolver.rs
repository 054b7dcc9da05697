//! Cache-then-provider rate resolution with triangulation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ratekeeper_common::{
    round_half_up, Currency, CurrencyPair, RateSample, RateSnapshot, RATE_SCALE,
};
use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::SharedRateCache;
use crate::conversion::RateSource;
use crate::error::{FxError, FxResult};
use crate::metrics::EngineMetrics;
use crate::provider::{ProviderAggregator, SourcedSnapshot};
use crate::store::RateStore;

/// Configuration for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Base currency requested from providers.
    pub base_currency: Currency,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_currency: Currency::usd(),
        }
    }
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Provider that answered.
    pub provider: String,
    /// Base currency declared in its snapshot.
    pub base: Currency,
    pub as_of: NaiveDate,
    pub pairs_cached: usize,
    pub samples_written: u64,
}

/// Derive the `from -> to` rate from a snapshot quoted against its own base.
///
/// Direct rates are returned as quoted; inverse and cross rates are rounded
/// half-up to six decimal places. `None` when a required leg is missing.
pub fn triangulate(snapshot: &RateSnapshot, from: &Currency, to: &Currency) -> Option<Decimal> {
    let base = &snapshot.base;

    if from == base {
        return snapshot.rate(to);
    }

    if to == base {
        let from_rate = snapshot.rate(from)?;
        return Decimal::ONE
            .checked_div(from_rate)
            .map(|r| round_half_up(r, RATE_SCALE));
    }

    let from_rate = snapshot.rate(from)?;
    let to_rate = snapshot.rate(to)?;
    to_rate
        .checked_div(from_rate)
        .map(|r| round_half_up(r, RATE_SCALE))
}

/// Resolves rates from the cache, falling back to the provider aggregator.
pub struct RateResolver {
    cache: SharedRateCache,
    aggregator: ProviderAggregator,
    store: Arc<dyn RateStore>,
    metrics: Arc<EngineMetrics>,
    config: ResolverConfig,
}

impl RateResolver {
    /// Create a resolver over a shared cache handle.
    ///
    /// Counters are recorded into the aggregator's metrics instance.
    pub fn new(
        cache: SharedRateCache,
        aggregator: ProviderAggregator,
        store: Arc<dyn RateStore>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            metrics: aggregator.metrics(),
            cache,
            aggregator,
            store,
            config,
        }
    }

    /// The cache this resolver reads and populates.
    pub fn cache(&self) -> &SharedRateCache {
        &self.cache
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    /// Get the rate for converting `from` into `to`.
    ///
    /// Returns `None` when no rate can be produced right now; provider
    /// failures are logged and swallowed on this path.
    #[instrument(skip_all, fields(from = %from, to = %to))]
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        let pair = CurrencyPair::new(from.clone(), to.clone());

        if pair.is_identity() {
            return Some(Decimal::ONE);
        }

        if let Some(cached) = self.cache.get(&pair) {
            self.metrics.cache_hit();
            return Some(cached.rate);
        }
        self.metrics.cache_miss();

        let resolved = match self
            .aggregator
            .resolve_latest(&self.config.base_currency, None)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(pair = %pair, error = %e, "No rate available from providers");
                return None;
            }
        };

        self.absorb(&resolved, Utc::now()).await;

        let Some(rate) = triangulate(&resolved.snapshot, from, to) else {
            debug!(
                pair = %pair,
                provider = %resolved.provider,
                "Snapshot does not contain the requested currencies"
            );
            return None;
        };

        // Direct pairs were cached by absorb; keep derived ones too.
        if pair.base != resolved.snapshot.base {
            self.cache.put(pair, rate, resolved.provider.as_str());
        }

        Some(rate)
    }

    /// Clear the cache and repopulate it from one forced aggregation pass.
    ///
    /// Unlike [`get_rate`](Self::get_rate), failure here is reported as
    /// [`FxError::RateUnavailable`].
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> FxResult<RefreshReport> {
        self.cache.clear();

        let resolved = self
            .aggregator
            .resolve_latest(&self.config.base_currency, None)
            .await
            .map_err(|e| {
                error!(error = %e, "Rate refresh failed");
                FxError::RateUnavailable(e.to_string())
            })?;

        let (pairs_cached, samples_written) = self.absorb(&resolved, Utc::now()).await;
        self.metrics.refreshed();

        let report = RefreshReport {
            provider: resolved.provider,
            base: resolved.snapshot.base,
            as_of: resolved.snapshot.as_of,
            pairs_cached,
            samples_written,
        };

        info!(
            provider = %report.provider,
            base = %report.base,
            as_of = %report.as_of,
            pairs_cached = report.pairs_cached,
            samples_written = report.samples_written,
            "Rates refreshed"
        );

        Ok(report)
    }

    /// Cache every direct pair in the snapshot and persist one sample per pair.
    ///
    /// Store failures are logged; they never fail the resolution.
    async fn absorb(&self, resolved: &SourcedSnapshot, observed_at: DateTime<Utc>) -> (usize, u64) {
        let mut samples = Vec::with_capacity(resolved.snapshot.rates.len());

        for (pair, rate) in resolved.snapshot.pairs() {
            if pair.is_identity() {
                continue;
            }
            self.cache.put(pair.clone(), rate, resolved.provider.as_str());
            samples.push(RateSample::new(pair, rate, resolved.provider.as_str(), observed_at));
        }

        let written = match self.store.insert_all(&samples).await {
            Ok(written) => {
                self.metrics.samples_written(written);
                written
            }
            Err(e) => {
                warn!(
                    provider = %resolved.provider,
                    samples = samples.len(),
                    error = %e,
                    "Failed to persist rate samples"
                );
                0
            }
        };

        (samples.len(), written)
    }
}

#[async_trait]
impl RateSource for RateResolver {
    async fn get_rate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        RateResolver::get_rate(self, from, to).await
    }
}
