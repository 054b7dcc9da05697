//! Daemon configuration.

use std::time::Duration;

use ratekeeper_common::{constants, Currency, DurationExt};
use reqwest::Url;

/// One upstream provider endpoint, in priority order.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub name: String,
    /// May embed an API key; never logged.
    pub url: String,
}

impl std::fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("name", &self.name)
            .field("url", &"<redacted>")
            .finish()
    }
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Endpoints; the first listed is tried first.
    pub endpoints: Vec<ProviderEndpoint>,
    /// Per-call timeout enforced by each client.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            timeout: constants::default_provider_timeout().as_std(),
        }
    }
}

/// Schedule for the refresh and retention timers.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Interval between forced refreshes.
    pub refresh_interval: Duration,
    /// Interval between retention sweeps.
    pub cleanup_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval: constants::default_refresh_interval().as_std(),
            cleanup_interval: constants::default_cleanup_interval().as_std(),
        }
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Base currency requested from providers.
    pub base_currency: String,
    /// Cached rate time-to-live.
    pub cache_ttl: Duration,
    /// How long persisted samples are kept.
    pub retention: Duration,
    /// Provider configuration.
    pub provider_config: ProviderConfig,
    /// Timer configuration.
    pub schedule_config: ScheduleConfig,
    /// Postgres URL; samples are kept in memory when absent.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub database_max_connections: u32,
    /// Log level.
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            cache_ttl: constants::default_cache_ttl().as_std(),
            retention: constants::default_retention().as_std(),
            provider_config: ProviderConfig::default(),
            schedule_config: ScheduleConfig::default(),
            database_url: None,
            database_max_connections: 5,
            log_level: "info".to_string(),
        }
    }
}

/// Provider names are short identifiers, never part of a URL.
fn is_provider_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl ProviderEndpoint {
    fn check(&self) -> Result<(), String> {
        if !is_provider_name(&self.name) {
            return Err("Provider name must be letters, digits, '-', '_' or '.'".to_string());
        }
        match Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(format!("Provider {} has an invalid URL", self.name)),
        }
    }
}

/// Parse `name=url,name=url` into endpoints, keeping order.
pub fn parse_provider_list(raw: &str) -> Result<Vec<ProviderEndpoint>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let malformed = || format!("Provider entry must be name=url, got {:?}", redact(entry));
            let (name, url) = entry.split_once('=').ok_or_else(malformed)?;
            let endpoint = ProviderEndpoint {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            };
            if !is_provider_name(&endpoint.name) || endpoint.url.is_empty() {
                return Err(malformed());
            }
            endpoint.check()?;
            Ok(endpoint)
        })
        .collect()
}

/// Keep only a well-formed name; anything else may be part of a URL.
fn redact(entry: &str) -> String {
    match entry.split_once('=') {
        Some((name, _)) if is_provider_name(name.trim()) => format!("{}=<redacted>", name.trim()),
        _ => "<redacted>".to_string(),
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();

        let seconds = |key: &str| -> Result<Option<Duration>, String> {
            lookup(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|_| format!("{key} must be a whole number of seconds"))
                })
                .transpose()
        };

        if let Some(base) = lookup("BASE_CURRENCY") {
            config.base_currency = base;
        }

        if let Some(ttl) = seconds("CACHE_TTL_SECONDS")? {
            config.cache_ttl = ttl;
        }

        if let Some(days) = lookup("RETENTION_DAYS") {
            let days: u64 = days
                .trim()
                .parse()
                .map_err(|_| "RETENTION_DAYS must be a whole number".to_string())?;
            config.retention = Duration::from_secs(days.saturating_mul(86_400));
        }

        if let Some(raw) = lookup("RATE_PROVIDERS") {
            config.provider_config.endpoints = parse_provider_list(&raw)?;
        }

        if let Some(timeout) = seconds("PROVIDER_TIMEOUT_SECONDS")? {
            config.provider_config.timeout = timeout;
        }

        if let Some(interval) = seconds("REFRESH_INTERVAL_SECONDS")? {
            config.schedule_config.refresh_interval = interval;
        }

        if let Some(interval) = seconds("CLEANUP_INTERVAL_SECONDS")? {
            config.schedule_config.cleanup_interval = interval;
        }

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.database_url = Some(url);
        }

        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.database_max_connections = max
                .trim()
                .parse()
                .map_err(|_| "DATABASE_MAX_CONNECTIONS must be a whole number".to_string())?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        Currency::parse(&self.base_currency).map_err(|e| e.to_string())?;
        self.validate_timings()?;

        if self.provider_config.endpoints.is_empty() {
            return Err("At least one rate provider must be configured".to_string());
        }
        for endpoint in &self.provider_config.endpoints {
            endpoint.check()?;
        }

        if self.database_max_connections == 0 {
            return Err("Database pool size cannot be 0".to_string());
        }

        Ok(())
    }

    /// Every duration must be non-zero and representable as a chrono duration.
    pub fn validate_timings(&self) -> Result<(), String> {
        let durations = [
            ("Cache TTL", self.cache_ttl),
            ("Retention", self.retention),
            ("Provider timeout", self.provider_config.timeout),
            ("Refresh interval", self.schedule_config.refresh_interval),
            ("Cleanup interval", self.schedule_config.cleanup_interval),
        ];
        for (label, duration) in durations {
            if duration.is_zero() {
                return Err(format!("{label} cannot be 0"));
            }
            if chrono::Duration::from_std(duration).is_err() {
                return Err(format!("{label} is too large"));
            }
        }
        Ok(())
    }
}
