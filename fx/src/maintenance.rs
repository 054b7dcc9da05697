//! Entry points invoked by an external scheduler.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ratekeeper_common::constants;
use tracing::{info, instrument};

use crate::error::FxResult;
use crate::metrics::EngineMetrics;
use crate::resolver::{RateResolver, RefreshReport};
use crate::store::RateStore;

/// Configuration for periodic maintenance.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Samples older than this are deleted.
    pub retention: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention: constants::default_retention(),
        }
    }
}

/// Refresh and retention tasks. The timer that drives them lives elsewhere.
pub struct Maintenance {
    resolver: Arc<RateResolver>,
    store: Arc<dyn RateStore>,
    metrics: Arc<EngineMetrics>,
    config: MaintenanceConfig,
}

impl Maintenance {
    pub fn new(
        resolver: Arc<RateResolver>,
        store: Arc<dyn RateStore>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            metrics: resolver.metrics(),
            resolver,
            store,
            config,
        }
    }

    /// Clear the cache and force one provider pass.
    pub async fn refresh_rates(&self) -> FxResult<RefreshReport> {
        self.resolver.refresh().await
    }

    /// Delete samples older than the retention horizon measured from `now`.
    #[instrument(skip(self))]
    pub async fn purge_expired_samples(&self, now: DateTime<Utc>) -> FxResult<u64> {
        let cutoff = now
            .checked_sub_signed(self.config.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let deleted = self.store.delete_older_than(cutoff).await?;
        self.metrics.samples_purged(deleted);

        info!(cutoff = %cutoff, deleted, "Purged expired rate samples");
        Ok(deleted)
    }
}
