use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::models::NewsItem;
use crate::services::enrichment::BatchProcessor;
use crate::services::ingest_queue::IngestQueue;
use crate::services::metrics::PipelineMetrics;

/// Configuration for one batch worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Buffer size that triggers an immediate flush
    pub batch_size: usize,
    /// Maximum age of a non-empty buffer before it flushes anyway
    pub batch_timeout: Duration,
    /// Bounded wait per dequeue attempt, so the age check runs even when
    /// the queue is idle
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// One batch worker: drains the queue into a private buffer and flushes it
/// on size or age.
///
/// The buffer is exclusively owned; nothing is shared across flush cycles.
/// A failed flush is logged and dropped, never retried here and never fatal
/// to the worker loop, and every flushed item is acknowledged on the queue
/// regardless of outcome so a drain barrier cannot hang on a failed batch.
pub struct BatchWorker {
    queue: Arc<IngestQueue>,
    processor: Arc<dyn BatchProcessor>,
    metrics: Arc<PipelineMetrics>,
    config: WorkerConfig,
}

impl BatchWorker {
    pub fn new(
        queue: Arc<IngestQueue>,
        processor: Arc<dyn BatchProcessor>,
        metrics: Arc<PipelineMetrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            metrics,
            config,
        }
    }

    /// Worker loop. Runs until the owning task is cancelled; an in-flight
    /// flush at shutdown is not guaranteed to complete (the queue is not
    /// durable anyway).
    pub async fn run(self, worker_id: usize) {
        info!("Worker {} started", worker_id);

        let mut buffer: Vec<NewsItem> = Vec::new();
        let mut oldest_buffered = Instant::now();

        loop {
            if let Some(item) = self.queue.pop_timeout(self.config.poll_interval).await {
                if buffer.is_empty() {
                    // The age trigger measures the oldest buffered item
                    oldest_buffered = Instant::now();
                }
                buffer.push(item);
            }

            let flush_due = buffer.len() >= self.config.batch_size
                || (!buffer.is_empty()
                    && oldest_buffered.elapsed() >= self.config.batch_timeout);

            if flush_due {
                let batch = std::mem::take(&mut buffer);
                self.flush(worker_id, batch).await;
            }
        }
    }

    async fn flush(&self, worker_id: usize, batch: Vec<NewsItem>) {
        let count = batch.len();
        debug!("Worker {} flushing {} items", worker_id, count);
        self.metrics.record_batch_flushed();

        if let Err(e) = self.processor.process_batch(batch).await {
            error!("Worker {} batch of {} failed: {}", worker_id, count, e);
        }

        for _ in 0..count {
            self.queue.task_done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    fn item(id: i64) -> NewsItem {
        NewsItem {
            id,
            symbol: "AAPL".to_string(),
            published_at: 1_700_000_000 + id,
            headline: format!("headline {id}"),
            summary: String::new(),
            url: String::new(),
            source: String::new(),
            category: "general".to_string(),
            image: String::new(),
            content: None,
            sentiment: None,
            importance: None,
            ai_summary: None,
        }
    }

    struct RecordingProcessor {
        batches: Mutex<Vec<Vec<i64>>>,
        fail: AtomicBool,
    }

    impl RecordingProcessor {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl BatchProcessor for RecordingProcessor {
        async fn process_batch(&self, items: Vec<NewsItem>) -> Result<usize, AppError> {
            let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
            let count = ids.len();
            self.batches.lock().unwrap().push(ids);
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::External("processor down".to_string()));
            }
            Ok(count)
        }
    }

    struct TestRig {
        queue: Arc<IngestQueue>,
        processor: Arc<RecordingProcessor>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start_worker(config: WorkerConfig) -> TestRig {
        let queue = Arc::new(IngestQueue::new());
        let processor = Arc::new(RecordingProcessor::new());
        let worker = BatchWorker::new(
            queue.clone(),
            processor.clone(),
            Arc::new(PipelineMetrics::new()),
            config,
        );
        let handle = tokio::spawn(worker.run(1));
        TestRig {
            queue,
            processor,
            handle,
        }
    }

    #[tokio::test]
    async fn full_buffer_flushes_without_waiting() {
        let rig = start_worker(WorkerConfig {
            batch_size: 10,
            batch_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(20),
        });

        for id in 1..=10 {
            rig.queue.push(item(id)).await;
        }
        rig.queue.join().await;

        let batches = rig.processor.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], (1..=10).collect::<Vec<i64>>());
        rig.handle.abort();
    }

    #[tokio::test]
    async fn single_item_flushes_after_timeout() {
        let rig = start_worker(WorkerConfig {
            batch_size: 10,
            batch_timeout: Duration::from_millis(120),
            poll_interval: Duration::from_millis(30),
        });

        rig.queue.push(item(1)).await;
        rig.queue.join().await;

        assert_eq!(rig.processor.batch_sizes(), vec![1]);
        rig.handle.abort();
    }

    #[tokio::test]
    async fn overflow_items_flush_in_a_second_batch() {
        let rig = start_worker(WorkerConfig {
            batch_size: 10,
            batch_timeout: Duration::from_millis(120),
            poll_interval: Duration::from_millis(30),
        });

        for id in 1..=12 {
            rig.queue.push(item(id)).await;
        }
        rig.queue.join().await;

        let batches = rig.processor.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[1], vec![11, 12]);
        rig.handle.abort();
    }

    #[tokio::test]
    async fn failed_flush_does_not_stop_the_worker_or_the_barrier() {
        let rig = start_worker(WorkerConfig {
            batch_size: 2,
            batch_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(20),
        });

        rig.processor.fail.store(true, Ordering::SeqCst);
        rig.queue.push(item(1)).await;
        rig.queue.push(item(2)).await;
        // Barrier must release even though the batch failed
        rig.queue.join().await;

        rig.processor.fail.store(false, Ordering::SeqCst);
        rig.queue.push(item(3)).await;
        rig.queue.push(item(4)).await;
        rig.queue.join().await;

        assert_eq!(rig.processor.batch_sizes(), vec![2, 2]);
        rig.handle.abort();
    }

    #[tokio::test]
    async fn idle_worker_does_not_flush_empty_buffers() {
        let rig = start_worker(WorkerConfig {
            batch_size: 2,
            batch_timeout: Duration::from_millis(40),
            poll_interval: Duration::from_millis(10),
        });

        sleep(Duration::from_millis(150)).await;
        assert!(rig.processor.batch_sizes().is_empty());
        rig.handle.abort();
    }
}
