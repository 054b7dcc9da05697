//! FX engine error types.

use ratekeeper_common::{Currency, CurrencyPair, InputError, Period};
use std::fmt;
use thiserror::Error;

/// Why a single provider call did not yield a usable snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection, TLS or timeout failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Upstream answered with a non-success HTTP status.
    #[error("upstream returned status {0}")]
    Status(u16),

    /// Body could not be decoded, or the decoded rates are unusable.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Upstream reported the request as unsuccessful.
    #[error("upstream reported failure")]
    Unsuccessful,
}

/// A provider that was tried and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur in the FX engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// Malformed caller input.
    #[error(transparent)]
    InvalidInput(#[from] InputError),

    /// No rate could be produced from the cache or any provider.
    #[error("Rate not available for {from}/{to}")]
    RateNotAvailable { from: Currency, to: Currency },

    /// Every configured provider failed during one aggregation pass.
    #[error("All rate providers failed: [{}]", join_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),

    /// An explicit refresh could not obtain fresh rates.
    #[error("Rates unavailable: {0}")]
    RateUnavailable(String),

    /// Fewer than two samples inside the requested window.
    #[error("Insufficient data for {pair} over {period}: found {count} sample(s), need at least 2")]
    InsufficientData {
        pair: CurrencyPair,
        period: Period,
        count: usize,
    },

    /// The sample store rejected an operation.
    #[error("Rate store error: {0}")]
    Store(String),
}

impl FxError {
    /// Check if the caller may reasonably retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FxError::RateNotAvailable { .. }
                | FxError::AllProvidersFailed(_)
                | FxError::RateUnavailable(_)
                | FxError::Store(_)
        )
    }

    /// Get error code for client responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidInput(e) => e.error_code(),
            FxError::RateNotAvailable { .. } => "RATE_NOT_AVAILABLE",
            FxError::AllProvidersFailed(_) => "ALL_PROVIDERS_FAILED",
            FxError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            FxError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            FxError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
