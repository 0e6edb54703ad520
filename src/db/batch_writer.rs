use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::db::news_store::{NewsStore, StoreError};
use crate::models::StoredRecord;
use crate::services::rate_limiter::ConcurrencyLimiter;

/// Configuration for the chunked batch writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Store-imposed batch limit per write call
    pub chunk_size: usize,
    /// Retry ceiling per chunk after the initial attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts
    pub base_backoff: Duration,
    /// Upper bound of the random jitter added to each backoff
    pub max_jitter: Duration,
    /// Simultaneous chunk writes
    pub write_concurrency: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 25,
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
            max_jitter: Duration::from_millis(50),
            write_concurrency: 5,
        }
    }
}

/// Outcome of a write call: how many records landed, how many were lost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub persisted: usize,
    pub lost: usize,
}

impl WriteReport {
    fn merge(self, other: WriteReport) -> WriteReport {
        WriteReport {
            persisted: self.persisted + other.persisted,
            lost: self.lost + other.lost,
        }
    }
}

/// Writes record batches through a [`NewsStore`], tolerating partial
/// capacity rejection.
///
/// The input is split into store-limit chunks written with bounded
/// concurrency. When the store reports an unprocessed subset (or a
/// capacity-exceeded error), only that subset is retried, with exponential
/// backoff plus jitter, up to the retry ceiling. Any other store error
/// abandons the chunk's remaining records; they are reported as lost, not
/// propagated.
pub struct BatchWriter {
    store: Arc<dyn NewsStore>,
    limiter: ConcurrencyLimiter,
    config: WriterConfig,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn NewsStore>, config: WriterConfig) -> Self {
        Self {
            store,
            limiter: ConcurrencyLimiter::new(config.write_concurrency),
            config,
        }
    }

    pub async fn write_all(&self, records: Vec<StoredRecord>) -> WriteReport {
        if records.is_empty() {
            return WriteReport::default();
        }

        let chunks: Vec<Vec<StoredRecord>> = records
            .chunks(self.config.chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let reports = join_all(chunks.into_iter().map(|chunk| self.write_chunk(chunk))).await;
        reports
            .into_iter()
            .fold(WriteReport::default(), WriteReport::merge)
    }

    async fn write_chunk(&self, chunk: Vec<StoredRecord>) -> WriteReport {
        let _slot = self.limiter.acquire().await;

        let total = chunk.len();
        let mut pending = chunk;

        for attempt in 0..=self.config.max_retries {
            match self.store.batch_put(&pending).await {
                Ok(unprocessed) => {
                    if unprocessed.is_empty() {
                        return WriteReport {
                            persisted: total,
                            lost: 0,
                        };
                    }
                    warn!(
                        "Store left {} of {} records unprocessed (attempt {}/{})",
                        unprocessed.len(),
                        pending.len(),
                        attempt + 1,
                        self.config.max_retries + 1
                    );
                    pending = unprocessed;
                }
                Err(StoreError::CapacityExceeded) => {
                    warn!(
                        "Store capacity exceeded for chunk of {} (attempt {}/{})",
                        pending.len(),
                        attempt + 1,
                        self.config.max_retries + 1
                    );
                }
                Err(e) => {
                    error!(
                        "Store write failed, abandoning {} records: {}",
                        pending.len(),
                        e
                    );
                    return WriteReport {
                        persisted: total - pending.len(),
                        lost: pending.len(),
                    };
                }
            }

            if attempt < self.config.max_retries {
                sleep(self.backoff_delay(attempt)).await;
            }
        }

        error!(
            "Retries exhausted, {} of {} records lost",
            pending.len(),
            total
        );
        WriteReport {
            persisted: total - pending.len(),
            lost: pending.len(),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_backoff * 2u32.saturating_pow(attempt);
        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}
