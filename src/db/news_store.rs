use async_trait::async_trait;
use thiserror::Error;

use crate::models::StoredRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Throughput throttling; retryable with backoff
    #[error("write capacity exceeded")]
    CapacityExceeded,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Partition-key/sort-key record store.
///
/// Writes are upserts keyed by `(pk, sk)`, so re-sending an already-written
/// record overwrites identically and retries are safe. A `batch_put` may
/// persist only part of its input under throughput pressure; the rejected
/// subset comes back as "unprocessed" for the caller to retry.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Upsert a single record
    async fn put(&self, record: &StoredRecord) -> Result<(), StoreError>;

    /// Upsert one chunk of records (at most the store's batch limit).
    /// Returns the unprocessed subset; empty means everything landed.
    async fn batch_put(&self, records: &[StoredRecord]) -> Result<Vec<StoredRecord>, StoreError>;

    /// Range query over one symbol partition for the inclusive timestamp
    /// window `[from_ts, to_ts]`, optionally filtered by minimum importance.
    async fn query_range(
        &self,
        symbol: &str,
        from_ts: i64,
        to_ts: i64,
        min_importance: Option<i32>,
    ) -> Result<Vec<StoredRecord>, StoreError>;
}
