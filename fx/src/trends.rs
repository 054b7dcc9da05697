//! Percentage change over stored rate history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ratekeeper_common::{
    round_half_up, Currency, CurrencyPair, Period, PERCENT_SCALE, RATE_SCALE,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{FxError, FxResult};
use crate::store::RateStore;

/// Movement of a pair over a look-back window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub from: Currency,
    pub to: Currency,
    pub period: Period,
    pub oldest_rate: Decimal,
    pub newest_rate: Decimal,
    /// Two decimal places; negative when the rate fell.
    pub change_percentage: Decimal,
    pub oldest_timestamp: DateTime<Utc>,
    pub newest_timestamp: DateTime<Utc>,
    pub sample_count: usize,
}

/// `(newest - oldest) / oldest * 100`.
///
/// The ratio is rounded half-up to six places before scaling, and the result
/// to two places. Zero when `oldest` is zero.
pub fn percentage_change(oldest: Decimal, newest: Decimal) -> Decimal {
    let Some(ratio) = (newest - oldest).checked_div(oldest) else {
        return Decimal::ZERO;
    };

    round_half_up(
        round_half_up(ratio, RATE_SCALE) * Decimal::ONE_HUNDRED,
        PERCENT_SCALE,
    )
}

/// Computes trends by reading history straight from the store.
pub struct TrendsAnalyzer {
    store: Arc<dyn RateStore>,
}

impl TrendsAnalyzer {
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store }
    }

    /// Trend for caller-supplied codes and period such as `"7D"`.
    ///
    /// Input is validated before the store is touched.
    pub async fn calculate_trend(&self, from: &str, to: &str, period: &str) -> FxResult<TrendResult> {
        let pair = CurrencyPair::parse(from, to)?;
        let period = Period::parse(period)?;

        self.trend_at(pair, period, Utc::now()).await
    }

    /// Trend over `[now - period, now]`.
    #[instrument(skip(self), fields(pair = %pair, period = %period))]
    pub async fn trend_at(
        &self,
        pair: CurrencyPair,
        period: Period,
        now: DateTime<Utc>,
    ) -> FxResult<TrendResult> {
        let start = now
            .checked_sub_signed(period.duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let samples = self.store.query_range(&pair, start, now).await?;
        debug!(samples = samples.len(), "Loaded rate history");

        let (oldest, newest) = match samples.as_slice() {
            [oldest, .., newest] => (oldest, newest),
            _ => {
                return Err(FxError::InsufficientData {
                    pair,
                    period,
                    count: samples.len(),
                })
            }
        };

        Ok(TrendResult {
            change_percentage: percentage_change(oldest.rate, newest.rate),
            oldest_rate: oldest.rate,
            newest_rate: newest.rate,
            oldest_timestamp: oldest.observed_at,
            newest_timestamp: newest.observed_at,
            sample_count: samples.len(),
            from: pair.base,
            to: pair.target,
            period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRateStore;
    use chrono::Duration;
    use ratekeeper_common::RateSample;
    use rust_decimal_macros::dec;

    fn usd_eur() -> CurrencyPair {
        CurrencyPair::new(Currency::usd(), Currency::eur())
    }

    async fn store_with(samples: &[(i64, Decimal)], now: DateTime<Utc>) -> Arc<InMemoryRateStore> {
        let store = Arc::new(InMemoryRateStore::new());
        for (hours_ago, rate) in samples {
            let sample = RateSample::new(usd_eur(), *rate, "alpha", now - Duration::hours(*hours_ago));
            store.insert(&sample).await.unwrap();
        }
        store
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(dec!(0.85), dec!(0.95)), dec!(11.76));
        assert_eq!(percentage_change(dec!(1.20), dec!(1.10)), dec!(-8.33));
        assert_eq!(percentage_change(dec!(1.0), dec!(1.0)), dec!(0));
        assert_eq!(percentage_change(dec!(0), dec!(1.0)), dec!(0));
    }

    #[tokio::test]
    async fn test_rising_trend() {
        let now = Utc::now();
        let store = store_with(&[(48, dec!(0.85)), (2, dec!(0.95))], now).await;
        let analyzer = TrendsAnalyzer::new(store);

        let trend = analyzer.trend_at(usd_eur(), Period::parse("7D").unwrap(), now).await.unwrap();

        assert_eq!(trend.change_percentage, dec!(11.76));
        assert_eq!(trend.oldest_rate, dec!(0.85));
        assert_eq!(trend.newest_rate, dec!(0.95));
        assert_eq!(trend.oldest_timestamp, now - Duration::hours(48));
        assert_eq!(trend.sample_count, 2);
    }

    #[tokio::test]
    async fn test_falling_trend_uses_window_boundaries() {
        let now = Utc::now();
        let store = store_with(
            &[(100, dec!(2.00)), (20, dec!(1.20)), (10, dec!(1.50)), (1, dec!(1.10))],
            now,
        )
        .await;
        let analyzer = TrendsAnalyzer::new(store);

        let trend = analyzer.trend_at(usd_eur(), Period::parse("24H").unwrap(), now).await.unwrap();

        assert_eq!(trend.change_percentage, dec!(-8.33));
        assert_eq!(trend.sample_count, 3);
    }

    #[tokio::test]
    async fn test_insufficient_data() {
        let now = Utc::now();
        let period = Period::parse("1D").unwrap();

        for samples in [vec![], vec![(1, dec!(0.9))]] {
            let analyzer = TrendsAnalyzer::new(store_with(&samples, now).await);
            let err = analyzer.trend_at(usd_eur(), period, now).await.unwrap_err();

            match err {
                FxError::InsufficientData { count, .. } => assert_eq!(count, samples.len()),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_calculate_trend_normalizes_input() {
        let now = Utc::now();
        let store = store_with(&[(30, dec!(0.85)), (1, dec!(0.95))], now).await;
        let analyzer = TrendsAnalyzer::new(store);

        let trend = analyzer.calculate_trend("usd", "eur", "1m").await.unwrap();

        assert_eq!(trend.from, Currency::usd());
        assert_eq!(trend.to, Currency::eur());
        assert_eq!(trend.period.to_string(), "1M");
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let analyzer = TrendsAnalyzer::new(Arc::new(InMemoryRateStore::new()));

        let bad_period = analyzer.calculate_trend("USD", "EUR", "7W").await.unwrap_err();
        let bad_code = analyzer.calculate_trend("USD", "EU", "7D").await.unwrap_err();

        assert_eq!(bad_period.error_code(), "INVALID_PERIOD");
        assert_eq!(bad_code.error_code(), "INVALID_CURRENCY_CODE");
    }
}
