//! Time utilities and constants for Ratekeeper.

use chrono::{DateTime, Duration, Utc};

/// Default timing values.
pub mod constants {
    use super::Duration;

    /// Cached rate time-to-live (one hour).
    pub fn default_cache_ttl() -> Duration {
        Duration::seconds(3600)
    }

    /// How long persisted samples are kept (395 days).
    pub fn default_retention() -> Duration {
        Duration::days(395)
    }

    /// Interval between scheduled refreshes (one hour).
    pub fn default_refresh_interval() -> Duration {
        Duration::hours(1)
    }

    /// Interval between retention sweeps (one day).
    pub fn default_cleanup_interval() -> Duration {
        Duration::days(1)
    }

    /// Upper bound on a single provider call (10 seconds).
    pub fn default_provider_timeout() -> Duration {
        Duration::seconds(10)
    }
}

/// A timestamp with timezone (always UTC for Ratekeeper).
pub type Timestamp = DateTime<Utc>;

/// Whether something observed at `observed_at` is still inside `ttl` at `at`.
pub fn is_within(observed_at: Timestamp, ttl: Duration, at: Timestamp) -> bool {
    at.signed_duration_since(observed_at) < ttl
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
