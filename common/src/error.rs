//! Caller input errors.

use thiserror::Error;

/// Malformed input detected at the boundary, before any cache, provider or
/// store access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Not a three-letter ISO 4217 code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// Not `<digits><H|D|M|Y>`.
    #[error("Invalid period: {0:?} (expected digits followed by H, D, M or Y)")]
    InvalidPeriod(String),

    /// Amount is not strictly positive, or too large to convert.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl InputError {
    /// Get error code for client responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            InputError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            InputError::InvalidPeriod(_) => "INVALID_PERIOD",
            InputError::InvalidAmount(_) => "INVALID_AMOUNT",
        }
    }
}
