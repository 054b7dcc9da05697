//! Postgres-backed sample store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ratekeeper_common::{Currency, CurrencyPair, RateSample};
use ratekeeper_fx::{FxError, FxResult, RateStore};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::DaemonResult;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS rate_samples (
        id UUID PRIMARY KEY,
        base_currency CHAR(3) NOT NULL,
        target_currency CHAR(3) NOT NULL,
        rate NUMERIC(20, 10) NOT NULL CHECK (rate > 0),
        source TEXT NOT NULL,
        observed_at TIMESTAMPTZ NOT NULL
    )
"#;

const CREATE_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS rate_samples_pair_observed_idx
        ON rate_samples (base_currency, target_currency, observed_at)
"#;

const INSERT_SAMPLE: &str = r#"
    INSERT INTO rate_samples (id, base_currency, target_currency, rate, source, observed_at)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

fn store_error(e: sqlx::Error) -> FxError {
    FxError::Store(e.to_string())
}

fn sample_from_row(row: &PgRow) -> Result<RateSample, sqlx::Error> {
    let base: String = row.try_get("base_currency")?;
    let target: String = row.try_get("target_currency")?;

    Ok(RateSample {
        id: row.try_get::<Uuid, _>("id")?,
        base: Currency::new(base.trim()),
        target: Currency::new(target.trim()),
        rate: row.try_get::<Decimal, _>("rate")?,
        source: row.try_get("source")?,
        observed_at: row.try_get::<DateTime<Utc>, _>("observed_at")?,
    })
}

/// Sample store over a Postgres connection pool.
#[derive(Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> DaemonResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the samples table and its lookup index if missing.
    pub async fn migrate(&self) -> DaemonResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        info!("Rate sample schema ready");
        Ok(())
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn insert(&self, sample: &RateSample) -> FxResult<()> {
        sqlx::query(INSERT_SAMPLE)
            .bind(sample.id)
            .bind(sample.base.code())
            .bind(sample.target.code())
            .bind(sample.rate)
            .bind(&sample.source)
            .bind(sample.observed_at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    /// One transaction per batch, so a refresh lands whole or not at all.
    #[instrument(skip_all, fields(count = samples.len()))]
    async fn insert_all(&self, samples: &[RateSample]) -> FxResult<u64> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        for sample in samples {
            sqlx::query(INSERT_SAMPLE)
                .bind(sample.id)
                .bind(sample.base.code())
                .bind(sample.target.code())
                .bind(sample.rate)
                .bind(&sample.source)
                .bind(sample.observed_at)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        Ok(samples.len() as u64)
    }

    async fn query_range(
        &self,
        pair: &CurrencyPair,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FxResult<Vec<RateSample>> {
        let rows = sqlx::query(
            r#"
            SELECT id, base_currency, target_currency, rate, source, observed_at
            FROM rate_samples
            WHERE base_currency = $1 AND target_currency = $2
              AND observed_at >= $3 AND observed_at <= $4
            ORDER BY observed_at ASC
            "#,
        )
        .bind(pair.base.code())
        .bind(pair.target.code())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(sample_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> FxResult<u64> {
        let result = sqlx::query("DELETE FROM rate_samples WHERE observed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a scratch Postgres database"]
    async fn test_round_trip_against_postgres() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let store = PgRateStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();

        // Start from an empty table.
        let pair = CurrencyPair::new(Currency::new("XAU"), Currency::new("XAG"));
        let now = Utc::now();
        store.delete_older_than(now + Duration::days(1)).await.unwrap();

        let samples = vec![
            RateSample::new(pair.clone(), dec!(80.5), "alpha", now - Duration::hours(2)),
            RateSample::new(pair.clone(), dec!(81.25), "alpha", now - Duration::hours(1)),
        ];
        assert_eq!(store.insert_all(&samples).await.unwrap(), 2);

        let found = store
            .query_range(&pair, now - Duration::hours(3), now)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].rate, dec!(80.5));
        assert_eq!(found[1].pair(), pair);

        let deleted = store
            .delete_older_than(now - Duration::minutes(90))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }
}
