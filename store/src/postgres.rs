//! PostgreSQL-backed rate store.

use async_trait::async_trait;
use ratewatch_common::{Currency, CurrencyPair, RateObservation};
use ratewatch_fx::{RateStore, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

use crate::row::CurrencyRateRow;

const SELECT_COLUMNS: &str = "SELECT base_currency, target_currency, rate, fetched_at FROM currency_rate";

/// Rate store over a `currency_rate` table.
#[derive(Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to connect: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Write(format!("Migration failed: {}", e)))?;

        info!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    #[instrument(skip(self), fields(pair = %pair))]
    async fn find_latest(&self, pair: &CurrencyPair) -> Result<Option<RateObservation>, StoreError> {
        let sql = format!(
            "{} WHERE base_currency = $1 AND target_currency = $2 ORDER BY fetched_at DESC LIMIT 1",
            SELECT_COLUMNS
        );

        let row: Option<CurrencyRateRow> = sqlx::query_as(&sql)
            .bind(pair.base.code())
            .bind(pair.target.code())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(row.map(RateObservation::from))
    }

    #[instrument(skip(self, targets), fields(base = %base, targets = targets.len()))]
    async fn query_latest_for_many(
        &self,
        base: &Currency,
        targets: &[Currency],
    ) -> Result<Vec<RateObservation>, StoreError> {
        let codes: Vec<String> = targets.iter().map(|t| t.code().to_string()).collect();
        let sql = format!(
            "{} WHERE base_currency = $1 AND target_currency = ANY($2) ORDER BY fetched_at DESC",
            SELECT_COLUMNS
        );

        let rows: Vec<CurrencyRateRow> = sqlx::query_as(&sql)
            .bind(base.code())
            .bind(&codes)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        debug!(rows = rows.len(), "Loaded rate history");
        Ok(rows.into_iter().map(RateObservation::from).collect())
    }

    #[instrument(skip(self, observations), fields(count = observations.len()))]
    async fn save_batch(&self, observations: &[RateObservation]) -> Result<(), StoreError> {
        if observations.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Write(format!("Failed to begin transaction: {}", e)))?;

        for obs in observations {
            let row = CurrencyRateRow::from(obs);
            sqlx::query(
                "INSERT INTO currency_rate (base_currency, target_currency, rate, fetched_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(row.base_currency)
            .bind(row.target_currency)
            .bind(row.rate)
            .bind(row.fetched_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()
            .await
            .map_err(|e| StoreError::Write(format!("Failed to commit: {}", e)))?;

        debug!("Observation batch committed");
        Ok(())
    }
}
