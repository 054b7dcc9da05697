//! Rate provider trait and first-success failover aggregation.

use async_trait::async_trait;
use ratekeeper_common::{Currency, RateSnapshot};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{FxError, FxResult, ProviderError, ProviderFailure};
use crate::metrics::EngineMetrics;

/// Trait for upstream FX rate providers.
///
/// Implementations enforce their own call timeout. A transport failure is an
/// `Err`; a well-formed response the upstream flags as unsuccessful is an
/// `Ok` snapshot with `success == false`.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the latest rates, optionally limited to `symbols`.
    ///
    /// `base` is a hint; the returned snapshot declares the base actually used.
    async fn fetch_latest(
        &self,
        base: &Currency,
        symbols: Option<&[Currency]>,
    ) -> Result<RateSnapshot, ProviderError>;
}

/// A snapshot together with the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedSnapshot {
    pub provider: String,
    pub snapshot: RateSnapshot,
}

/// Tries providers in priority order and returns the first usable snapshot.
///
/// Calls are sequential: once a higher-priority provider succeeds, the rest
/// are not contacted.
pub struct ProviderAggregator {
    providers: Vec<Arc<dyn RateProvider>>,
    metrics: Arc<EngineMetrics>,
}

impl ProviderAggregator {
    /// Create a new aggregator; the first provider listed is tried first.
    pub fn new(providers: Vec<Arc<dyn RateProvider>>) -> Self {
        Self {
            providers,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Record counters into a shared metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics instance this aggregator records into.
    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    /// Resolve the latest snapshot from the first provider that succeeds.
    ///
    /// Fails with [`FxError::AllProvidersFailed`] only when every provider
    /// either errored or returned an unusable snapshot.
    #[instrument(skip(self, symbols), fields(base = %base))]
    pub async fn resolve_latest(
        &self,
        base: &Currency,
        symbols: Option<&[Currency]>,
    ) -> FxResult<SourcedSnapshot> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            let outcome = provider
                .fetch_latest(base, symbols)
                .await
                .and_then(validate_snapshot);

            match outcome {
                Ok(snapshot) => {
                    debug!(
                        provider = provider.name(),
                        base = %snapshot.base,
                        rates = snapshot.rates.len(),
                        "Got rates from provider"
                    );
                    return Ok(SourcedSnapshot {
                        provider: provider.name().to_string(),
                        snapshot,
                    });
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed to return rates"
                    );
                    self.metrics.provider_failed();
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        reason: e,
                    });
                }
            }
        }

        self.metrics.aggregation_failed();
        Err(FxError::AllProvidersFailed(failures))
    }
}

/// Reject snapshots that must not be cached or persisted.
fn validate_snapshot(snapshot: RateSnapshot) -> Result<RateSnapshot, ProviderError> {
    if !snapshot.success {
        return Err(ProviderError::Unsuccessful);
    }

    if snapshot.rates.is_empty() {
        return Err(ProviderError::Malformed("no rates in response".to_string()));
    }

    if let Some((target, rate)) = snapshot.first_non_positive() {
        return Err(ProviderError::Malformed(format!(
            "non-positive rate {rate} for {target}"
        )));
    }

    Ok(snapshot)
}

/// Scripted rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    response: parking_lot::Mutex<Result<RateSnapshot, ProviderError>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a mock that returns `snapshot` on every call.
    pub fn new(name: impl Into<String>, snapshot: RateSnapshot) -> Self {
        Self {
            name: name.into(),
            response: parking_lot::Mutex::new(Ok(snapshot)),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a mock that fails every call with `error`.
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            response: parking_lot::Mutex::new(Err(error)),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Replace the scripted response.
    pub fn respond_with(&self, response: Result<RateSnapshot, ProviderError>) {
        *self.response.lock() = response;
    }

    /// Number of times `fetch_latest` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_latest(
        &self,
        _base: &Currency,
        symbols: Option<&[Currency]>,
    ) -> Result<RateSnapshot, ProviderError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let mut snapshot = self.response.lock().clone()?;
        if let Some(symbols) = symbols {
            snapshot.rates.retain(|target, _| symbols.contains(target));
        }
        Ok(snapshot)
    }
}
