//! Ratekeeper Daemon
//!
//! Runs the rate engine as a service: HTTP providers in priority order,
//! samples persisted to Postgres, and timers for refresh and retention.

pub mod config;
pub mod daemon;
pub mod error;
pub mod http_provider;
pub mod pg_store;
pub mod state;

pub use config::{DaemonConfig, ProviderEndpoint};
pub use daemon::RateDaemon;
pub use error::{DaemonError, DaemonResult};
pub use http_provider::HttpRateProvider;
pub use pg_store::PgRateStore;
pub use state::DaemonState;
