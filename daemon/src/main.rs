//! Ratekeeper daemon binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratekeeper_daemon::{DaemonConfig, HttpRateProvider, PgRateStore, RateDaemon};
use ratekeeper_fx::{InMemoryRateStore, RateProvider, RateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::from_env().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Ratekeeper");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let providers = config
        .provider_config
        .endpoints
        .iter()
        .map(|endpoint| {
            HttpRateProvider::new(endpoint, config.provider_config.timeout)
                .map(|p| Arc::new(p) as Arc<dyn RateProvider>)
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        providers = ?config.provider_config.endpoints.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        "Rate providers configured"
    );

    let store: Arc<dyn RateStore> = match &config.database_url {
        Some(url) => {
            let store = PgRateStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; rate history is kept in memory only");
            Arc::new(InMemoryRateStore::new())
        }
    };

    let daemon = RateDaemon::new(config, providers, store)?;
    daemon.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    daemon.stop().await?;

    let metrics = daemon.metrics();
    info!(
        refreshes = metrics.refreshes,
        samples_written = metrics.samples_written,
        samples_purged = metrics.samples_purged,
        hit_ratio = metrics.hit_ratio(),
        "Ratekeeper shutdown complete"
    );
    Ok(())
}
