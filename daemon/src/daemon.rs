//! Daemon lifecycle: wires the engine together and drives its timers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use ratekeeper_common::Currency;
use ratekeeper_fx::{
    CacheStats, ConversionCalculator, Maintenance, MaintenanceConfig, MetricsSnapshot,
    ProviderAggregator, RateCache, RateCacheConfig, RateProvider, RateResolver, RateStore,
    ResolverConfig, TrendsAnalyzer,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::state::DaemonState;

fn chrono_duration(label: &str, value: Duration) -> DaemonResult<chrono::Duration> {
    chrono::Duration::from_std(value).map_err(|_| DaemonError::Config(format!("{label} is too large")))
}

/// Long-running rate service.
pub struct RateDaemon {
    config: DaemonConfig,
    state: Arc<RwLock<DaemonState>>,
    resolver: Arc<RateResolver>,
    maintenance: Arc<Maintenance>,
    calculator: ConversionCalculator,
    trends: TrendsAnalyzer,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RateDaemon {
    /// Assemble the engine over `providers`, tried in the given order.
    pub fn new(
        config: DaemonConfig,
        providers: Vec<Arc<dyn RateProvider>>,
        store: Arc<dyn RateStore>,
    ) -> DaemonResult<Self> {
        config.validate_timings().map_err(DaemonError::Config)?;

        let base_currency =
            Currency::parse(&config.base_currency).map_err(|e| DaemonError::Config(e.to_string()))?;

        let cache = Arc::new(RateCache::with_config(RateCacheConfig {
            ttl: chrono_duration("Cache TTL", config.cache_ttl)?,
        }));
        let resolver = Arc::new(RateResolver::new(
            cache,
            ProviderAggregator::new(providers),
            store.clone(),
            ResolverConfig { base_currency },
        ));
        let maintenance = Arc::new(Maintenance::new(
            resolver.clone(),
            store.clone(),
            MaintenanceConfig {
                retention: chrono_duration("Retention", config.retention)?,
            },
        ));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            calculator: ConversionCalculator::new(resolver.clone()),
            trends: TrendsAnalyzer::new(store),
            config,
            state: Arc::new(RwLock::new(DaemonState::Starting)),
            resolver,
            maintenance,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Warm the cache and start the refresh and retention timers.
    #[instrument(skip(self))]
    pub async fn start(&self) -> DaemonResult<()> {
        {
            let mut state = self.state.write();
            if *state != DaemonState::Starting {
                return Err(DaemonError::InvalidState(*state));
            }
            *state = DaemonState::Running;
        }

        info!(base = %self.config.base_currency, "Starting rate daemon");

        // A cold start without rates is not fatal; lookups retry on demand.
        if let Err(e) = self.maintenance.refresh_rates().await {
            warn!(error = %e, code = e.error_code(), "Initial refresh failed");
        }

        self.start_background_tasks();

        info!("Rate daemon started");
        Ok(())
    }

    /// Stop the timers and wait for any in-flight run to finish.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> DaemonResult<()> {
        info!("Stopping rate daemon");
        *self.state.write() = DaemonState::ShuttingDown;

        let _ = self.shutdown_tx.send(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Timer task ended abnormally");
            }
        }

        *self.state.write() = DaemonState::Stopped;
        info!("Rate daemon stopped");
        Ok(())
    }

    fn start_background_tasks(&self) {
        let schedule = &self.config.schedule_config;

        // The initial refresh already ran, so the first scheduled one waits a full period.
        let maintenance = self.maintenance.clone();
        let refresh = self.spawn_timer("refresh", schedule.refresh_interval, false, move || {
            let maintenance = maintenance.clone();
            async move {
                if let Err(e) = maintenance.refresh_rates().await {
                    warn!(error = %e, code = e.error_code(), "Scheduled refresh failed");
                }
            }
        });

        let maintenance = self.maintenance.clone();
        let cleanup = self.spawn_timer("cleanup", schedule.cleanup_interval, true, move || {
            let maintenance = maintenance.clone();
            async move {
                if let Err(e) = maintenance.purge_expired_samples(Utc::now()).await {
                    warn!(error = %e, code = e.error_code(), "Retention sweep failed");
                }
            }
        });

        self.tasks.lock().extend([refresh, cleanup]);
    }

    fn spawn_timer<F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        immediate: bool,
        task: F,
    ) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let start = if immediate { Instant::now() } else { Instant::now() + period };
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => task().await,
                    _ = shutdown.changed() => break,
                }
            }

            debug!(timer = name, "Timer stopped");
        })
    }

    /// Get current daemon state.
    pub fn state(&self) -> DaemonState {
        *self.state.read()
    }

    pub fn calculator(&self) -> &ConversionCalculator {
        &self.calculator
    }

    pub fn trends(&self) -> &TrendsAnalyzer {
        &self.trends
    }

    pub fn resolver(&self) -> &Arc<RateResolver> {
        &self.resolver
    }

    pub fn maintenance(&self) -> &Arc<Maintenance> {
        &self.maintenance
    }

    /// Engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.resolver.metrics().snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ratekeeper_common::RateSnapshot;
    use ratekeeper_fx::{InMemoryRateStore, MockRateProvider, ProviderError};
    use rust_decimal_macros::dec;

    fn snapshot() -> RateSnapshot {
        RateSnapshot::new(
            Currency::usd(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            [(Currency::eur(), dec!(0.85)), (Currency::gbp(), dec!(0.75))]
                .into_iter()
                .collect(),
        )
    }

    fn create_test_config(refresh_interval: Duration) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.schedule_config.refresh_interval = refresh_interval;
        config
    }

    #[tokio::test]
    async fn test_daemon_start_stop() {
        let provider = Arc::new(MockRateProvider::new("alpha", snapshot()));
        let store = Arc::new(InMemoryRateStore::new());
        let daemon = RateDaemon::new(
            create_test_config(Duration::from_secs(3600)),
            vec![provider.clone() as Arc<dyn RateProvider>],
            store.clone(),
        )
        .unwrap();
        assert_eq!(daemon.state(), DaemonState::Starting);

        daemon.start().await.unwrap();
        assert!(daemon.state().is_operational());
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(daemon.cache_stats().valid_entries, 2);

        let conversion = daemon.calculator().convert(dec!(10), "USD", "GBP").await.unwrap();
        assert_eq!(conversion.converted_amount, dec!(7.5));
        assert_eq!(provider.calls(), 1);

        daemon.stop().await.unwrap();
        assert!(daemon.state().is_terminal());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let provider = Arc::new(MockRateProvider::new("alpha", snapshot()));
        let daemon = RateDaemon::new(
            create_test_config(Duration::from_secs(3600)),
            vec![provider as Arc<dyn RateProvider>],
            Arc::new(InMemoryRateStore::new()),
        )
        .unwrap();

        daemon.start().await.unwrap();
        let err = daemon.start().await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");

        daemon.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_survives_provider_outage() {
        let provider = Arc::new(MockRateProvider::failing("alpha", ProviderError::Status(503)));
        let daemon = RateDaemon::new(
            create_test_config(Duration::from_secs(3600)),
            vec![provider as Arc<dyn RateProvider>],
            Arc::new(InMemoryRateStore::new()),
        )
        .unwrap();

        daemon.start().await.unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);
        assert_eq!(daemon.cache_stats().total_entries, 0);

        daemon.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_timer_fires() {
        let provider = Arc::new(MockRateProvider::new("alpha", snapshot()));
        let daemon = RateDaemon::new(
            create_test_config(Duration::from_millis(40)),
            vec![provider.clone() as Arc<dyn RateProvider>],
            Arc::new(InMemoryRateStore::new()),
        )
        .unwrap();

        daemon.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        daemon.stop().await.unwrap();

        assert!(provider.calls() >= 2);
        assert!(daemon.metrics().refreshes >= 2);

        // No further calls once stopped.
        let calls = provider.calls();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.calls(), calls);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = create_test_config(Duration::ZERO);

        let result = RateDaemon::new(config, Vec::new(), Arc::new(InMemoryRateStore::new()));
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[tokio::test]
    async fn test_stop_survives_panicking_timer() {
        let daemon = RateDaemon::new(
            create_test_config(Duration::from_secs(3600)),
            Vec::new(),
            Arc::new(InMemoryRateStore::new()),
        )
        .unwrap();
        daemon.start().await.unwrap();

        let failing = daemon.spawn_timer("failing", Duration::from_millis(10), true, || async {
            panic!("timer failure");
        });
        daemon.tasks.lock().push(failing);
        tokio::time::sleep(Duration::from_millis(30)).await;

        daemon.stop().await.unwrap();
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }

    #[test]
    fn test_invalid_base_currency() {
        let mut config = DaemonConfig::default();
        config.base_currency = "ZZZ".into();

        let result = RateDaemon::new(config, Vec::new(), Arc::new(InMemoryRateStore::new()));
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }
}
