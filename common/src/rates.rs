//! Provider snapshots and persisted rate samples.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::monetary::{Currency, CurrencyPair};

/// All rates returned by one provider call, relative to one declared base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Base currency declared by the provider.
    pub base: Currency,
    /// Date the provider says the rates apply to.
    pub as_of: NaiveDate,
    /// Target currency to units of target per one unit of base.
    pub rates: BTreeMap<Currency, Decimal>,
    /// Whether the upstream reported success.
    pub success: bool,
}

impl RateSnapshot {
    /// Create a successful snapshot.
    pub fn new(base: Currency, as_of: NaiveDate, rates: BTreeMap<Currency, Decimal>) -> Self {
        Self {
            base,
            as_of,
            rates,
            success: true,
        }
    }

    /// Snapshot for a well-formed but unsuccessful upstream response.
    pub fn failed(base: Currency, as_of: NaiveDate) -> Self {
        Self {
            base,
            as_of,
            rates: BTreeMap::new(),
            success: false,
        }
    }

    /// Rate from the declared base to `target`.
    pub fn rate(&self, target: &Currency) -> Option<Decimal> {
        self.rates.get(target).copied()
    }

    /// Every (base, target) pair with its rate.
    pub fn pairs(&self) -> impl Iterator<Item = (CurrencyPair, Decimal)> + '_ {
        self.rates
            .iter()
            .map(|(target, rate)| (CurrencyPair::new(self.base.clone(), target.clone()), *rate))
    }

    /// First target whose rate is zero or negative, if any.
    pub fn first_non_positive(&self) -> Option<(&Currency, &Decimal)> {
        self.rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO)
    }
}

/// One persisted historical observation. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub id: Uuid,
    pub base: Currency,
    pub target: Currency,
    /// Strictly positive, stored as NUMERIC(20,10).
    pub rate: Decimal,
    /// Name of the provider the rate came from.
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl RateSample {
    /// Create a new sample with a fresh time-ordered ID.
    pub fn new(
        pair: CurrencyPair,
        rate: Decimal,
        source: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            base: pair.base,
            target: pair.target,
            rate,
            source: source.into(),
            observed_at,
        }
    }

    /// Get the currency pair.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.target.clone())
    }
}
