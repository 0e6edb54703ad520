use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::news_store::{NewsStore, StoreError};
use crate::models::{partition_key, sort_key_range, StoredRecord};

/// Postgres-backed record store.
///
/// Keeps the partition-key/sort-key scheme as plain text columns so the
/// lexicographic sort-key range semantics carry over unchanged; the full
/// item lives in a JSONB payload. A relational backend never rejects part
/// of a batch, so `batch_put` reports an empty unprocessed set on success.
pub struct PostgresNewsStore {
    pool: PgPool,
}

impl PostgresNewsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_news (
                pk          TEXT NOT NULL,
                sk          TEXT NOT NULL,
                symbol      TEXT NOT NULL,
                importance  INT,
                payload     JSONB NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (pk, sk)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl NewsStore for PostgresNewsStore {
    async fn put(&self, record: &StoredRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_news (pk, sk, symbol, importance, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (pk, sk) DO UPDATE SET
                symbol = EXCLUDED.symbol,
                importance = EXCLUDED.importance,
                payload = EXCLUDED.payload,
                updated_at = NOW()
            "#,
        )
        .bind(&record.pk)
        .bind(&record.sk)
        .bind(&record.symbol)
        .bind(record.importance)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn batch_put(&self, records: &[StoredRecord]) -> Result<Vec<StoredRecord>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO stock_news (pk, sk, symbol, importance, payload) ");
        builder.push_values(records, |mut row, record| {
            row.push_bind(&record.pk)
                .push_bind(&record.sk)
                .push_bind(&record.symbol)
                .push_bind(record.importance)
                .push_bind(&record.payload);
        });
        builder.push(
            r#" ON CONFLICT (pk, sk) DO UPDATE SET
                symbol = EXCLUDED.symbol,
                importance = EXCLUDED.importance,
                payload = EXCLUDED.payload,
                updated_at = NOW()"#,
        );

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Vec::new())
    }

    async fn query_range(
        &self,
        symbol: &str,
        from_ts: i64,
        to_ts: i64,
        min_importance: Option<i32>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let pk = partition_key(symbol);
        let (sk_low, sk_high) = sort_key_range(from_ts, to_ts);

        sqlx::query_as::<_, StoredRecord>(
            r#"
            SELECT pk, sk, symbol, importance, payload
            FROM stock_news
            WHERE pk = $1
              AND sk BETWEEN $2 AND $3
              AND ($4::INT IS NULL OR importance >= $4)
            ORDER BY sk
            "#,
        )
        .bind(&pk)
        .bind(&sk_low)
        .bind(&sk_high)
        .bind(min_importance)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
