//! Currency conversion types and operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ratekeeper_common::{round_half_up, Currency, InputError, RATE_SCALE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{FxError, FxResult};

/// Anything that can answer "what is the rate from `from` to `to` right now".
///
/// `None` means no rate is available at the moment; callers may retry.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn get_rate(&self, from: &Currency, to: &Currency) -> Option<Decimal>;
}

/// Request to perform a conversion, as received from the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(amount: Decimal, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            amount,
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Represents a completed currency conversion.
///
/// `from` and `to` echo the request exactly as the caller spelled them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Unique conversion ID.
    pub id: Uuid,
    pub from: String,
    pub to: String,
    /// Input amount.
    pub amount: Decimal,
    /// Rate applied.
    pub rate: Decimal,
    /// `amount * rate`, rounded half-up to six places.
    pub converted_amount: Decimal,
    /// When the conversion was executed.
    pub executed_at: DateTime<Utc>,
}

/// Applies resolved rates to amounts.
pub struct ConversionCalculator {
    rates: Arc<dyn RateSource>,
}

impl ConversionCalculator {
    pub fn new(rates: Arc<dyn RateSource>) -> Self {
        Self { rates }
    }

    /// Convert `amount` from one currency into another.
    ///
    /// Codes are validated and case-normalized before lookup. Converting a
    /// currency into itself returns the amount unchanged at rate 1 without
    /// consulting the rate source.
    #[instrument(skip(self))]
    pub async fn convert(&self, amount: Decimal, from: &str, to: &str) -> FxResult<Conversion> {
        let from_currency = Currency::parse(from)?;
        let to_currency = Currency::parse(to)?;

        if amount <= Decimal::ZERO {
            return Err(InputError::InvalidAmount(amount.to_string()).into());
        }

        let (rate, converted_amount) = if from_currency == to_currency {
            (Decimal::ONE, amount)
        } else {
            let rate = self
                .rates
                .get_rate(&from_currency, &to_currency)
                .await
                .ok_or_else(|| FxError::RateNotAvailable {
                    from: from_currency.clone(),
                    to: to_currency.clone(),
                })?;

            let product = amount
                .checked_mul(rate)
                .ok_or_else(|| InputError::InvalidAmount(amount.to_string()))?;

            (rate, round_half_up(product, RATE_SCALE))
        };

        let conversion = Conversion {
            id: Uuid::now_v7(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
            rate,
            converted_amount,
            executed_at: Utc::now(),
        };

        info!(
            conversion_id = %conversion.id,
            from = %from_currency,
            to = %to_currency,
            rate = %conversion.rate,
            "Conversion completed"
        );

        Ok(conversion)
    }

    /// Convert using a transport-layer request.
    pub async fn convert_request(&self, request: &ConversionRequest) -> FxResult<Conversion> {
        self.convert(request.amount, &request.from, &request.to).await
    }
}
