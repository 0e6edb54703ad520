use std::sync::Arc;
use std::sync::Mutex;

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::info;

use crate::external::feed::FinnhubFeed;
use crate::models::NewsItem;
use crate::services::batch_worker::{BatchWorker, WorkerConfig};
use crate::services::enrichment::{BatchProcessor, EnrichmentConfig};
use crate::services::ingest_queue::IngestQueue;
use crate::services::metrics::PipelineMetrics;
use crate::services::rate_limiter::RateLimiter;

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub worker_count: usize,
    pub worker: WorkerConfig,
    pub enrichment: EnrichmentConfig,
    /// Feed quota: `feed_max_calls` per `feed_period`
    pub feed_max_calls: u32,
    pub feed_period: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            worker: WorkerConfig::default(),
            enrichment: EnrichmentConfig::default(),
            feed_max_calls: 60,
            feed_period: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_usize("NEWS_WORKER_COUNT", defaults.worker_count),
            worker: WorkerConfig {
                batch_size: env_usize("NEWS_BATCH_SIZE", defaults.worker.batch_size),
                batch_timeout: Duration::from_secs(env_u64(
                    "NEWS_BATCH_TIMEOUT_SECS",
                    defaults.worker.batch_timeout.as_secs(),
                )),
                poll_interval: defaults.worker.poll_interval,
            },
            enrichment: EnrichmentConfig {
                min_content_len: env_usize(
                    "NEWS_MIN_CONTENT_LEN",
                    defaults.enrichment.min_content_len,
                ),
                fetch_concurrency: env_usize(
                    "NEWS_FETCH_CONCURRENCY",
                    defaults.enrichment.fetch_concurrency,
                ),
            },
            feed_max_calls: env_u64("FEED_MAX_CALLS_PER_MINUTE", defaults.feed_max_calls as u64)
                as u32,
            feed_period: defaults.feed_period,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Owns the ingestion pipeline: the shared queue, the worker pool, and the
/// paced producer side.
///
/// Ingestion is fire-and-forget: `ingest_symbol` fetches feed metadata and
/// enqueues raw items, returning as soon as they are queued. Enrichment and
/// persistence happen on the workers; callers that need a completion signal
/// use [`drain`].
///
/// [`drain`]: PipelineManager::drain
pub struct PipelineManager {
    queue: Arc<IngestQueue>,
    feed: Arc<FinnhubFeed>,
    feed_limiter: RateLimiter,
    processor: Arc<dyn BatchProcessor>,
    metrics: Arc<PipelineMetrics>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PipelineConfig,
}

impl PipelineManager {
    pub fn new(
        feed: Arc<FinnhubFeed>,
        processor: Arc<dyn BatchProcessor>,
        metrics: Arc<PipelineMetrics>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue: Arc::new(IngestQueue::new()),
            feed,
            feed_limiter: RateLimiter::new(config.feed_max_calls, config.feed_period),
            processor,
            metrics,
            workers: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Spawn the worker pool. Idempotent only in the sense that calling it
    /// twice spawns a second pool; callers start the pipeline once.
    pub fn start(&self) {
        let mut workers = self.workers.lock().expect("worker list poisoned");
        for index in 0..self.config.worker_count {
            let worker = BatchWorker::new(
                self.queue.clone(),
                self.processor.clone(),
                self.metrics.clone(),
                self.config.worker.clone(),
            );
            workers.push(tokio::spawn(worker.run(index + 1)));
        }
        info!("Pipeline started with {} workers", self.config.worker_count);
    }

    /// Cancel the worker pool. In-flight flushes are not awaited; the queue
    /// is in-memory only, so anything unprocessed is gone.
    pub fn stop(&self) {
        let mut workers = self.workers.lock().expect("worker list poisoned");
        for handle in workers.drain(..) {
            handle.abort();
        }
        info!("Pipeline stopped");
    }

    /// Fetch feed metadata for one symbol and enqueue the raw items.
    /// Returns the number enqueued. Paced by the feed rate limiter.
    pub async fn ingest_symbol(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> usize {
        self.feed_limiter.wait().await;
        let items = self.feed.company_news(symbol, from_date, to_date).await;
        let count = self.enqueue(items).await;
        info!("Enqueued {} raw items for {}", count, symbol);
        count
    }

    /// Ingest a list of symbols sequentially; each feed call is paced.
    pub async fn ingest_symbols(
        &self,
        symbols: &[String],
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> usize {
        let mut total = 0;
        for symbol in symbols {
            total += self.ingest_symbol(symbol, from_date, to_date).await;
        }
        total
    }

    /// Enqueue pre-fetched raw items directly
    pub async fn enqueue(&self, items: Vec<NewsItem>) -> usize {
        let count = items.len();
        for item in items {
            self.queue.push(item).await;
        }
        self.metrics.record_enqueued(count as u64);
        count
    }

    /// Drain barrier: resolves once every enqueued item has flowed through
    /// a flush cycle (successfully or not).
    pub async fn drain(&self) {
        self.queue.join().await;
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn queued(&self) -> usize {
        self.queue.outstanding()
    }
}
