//! Daemon error types.

use thiserror::Error;

use crate::state::DaemonState;

/// Errors raised while assembling or running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL for provider {provider}")]
    InvalidProviderUrl { provider: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Daemon cannot start from state {0:?}")]
    InvalidState(DaemonState),
}

impl DaemonError {
    /// Get the error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            DaemonError::Config(_) => "CONFIG_ERROR",
            DaemonError::InvalidProviderUrl { .. } => "INVALID_PROVIDER_URL",
            DaemonError::HttpClient(_) => "HTTP_CLIENT_ERROR",
            DaemonError::Database(_) => "DATABASE_ERROR",
            DaemonError::InvalidState(_) => "INVALID_STATE",
        }
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = std::result::Result<T, DaemonError>;
