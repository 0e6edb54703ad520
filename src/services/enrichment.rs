use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};

use crate::db::BatchWriter;
use crate::errors::AppError;
use crate::external::article_fetcher::FetcherRegistry;
use crate::external::classifier::NewsClassifier;
use crate::models::{NewsItem, StoredRecord};
use crate::services::metrics::PipelineMetrics;
use crate::services::rate_limiter::ConcurrencyLimiter;

/// Configuration for the enrichment stage
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Minimum article length (trimmed chars) for an item to be analyzed
    pub min_content_len: usize,
    /// Simultaneous outbound content fetches
    pub fetch_concurrency: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_content_len: 50,
            fetch_concurrency: 5,
        }
    }
}

/// Consumer of a flushed buffer. The batch worker only knows this seam, so
/// tests can observe flush behavior without standing up the full pipeline.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    /// Process one flushed buffer as a unit. Returns the number of records
    /// persisted.
    async fn process_batch(&self, items: Vec<NewsItem>) -> Result<usize, AppError>;
}

/// Turns a flushed buffer of raw items into persisted, analyzed records.
///
/// Stages: concurrency-limited content fetch fan-out (per-item failures
/// leave that item without content), validity filter, one order-preserving
/// classifier call, field merge, chunked persistence. Items dropped along
/// the way are counted in [`PipelineMetrics`], never retried here.
pub struct EnrichmentService {
    registry: Arc<FetcherRegistry>,
    classifier: Arc<dyn NewsClassifier>,
    writer: Arc<BatchWriter>,
    metrics: Arc<PipelineMetrics>,
    fetch_limiter: ConcurrencyLimiter,
    min_content_len: usize,
}

impl EnrichmentService {
    pub fn new(
        registry: Arc<FetcherRegistry>,
        classifier: Arc<dyn NewsClassifier>,
        writer: Arc<BatchWriter>,
        metrics: Arc<PipelineMetrics>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            writer,
            metrics,
            fetch_limiter: ConcurrencyLimiter::new(config.fetch_concurrency),
            min_content_len: config.min_content_len,
        }
    }

    /// A classifier-level failure abandons the whole filtered batch;
    /// per-item failures only drop that item.
    async fn run_batch(&self, mut items: Vec<NewsItem>) -> Result<usize, AppError> {
        if items.is_empty() {
            return Ok(0);
        }

        self.fetch_missing_content(&mut items).await;

        // Validity filter: too-short or missing content is dropped for good
        let requested = items.len();
        let mut valid: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| is_valid_content(item.content.as_deref(), self.min_content_len))
            .collect();

        let dropped = requested - valid.len();
        if dropped > 0 {
            warn!("Dropping {} of {} items with insufficient content", dropped, requested);
            self.metrics.record_invalid_dropped(dropped as u64);
        }

        if valid.is_empty() {
            info!("No valid news to analyze (requested: {})", requested);
            return Ok(0);
        }

        info!("Analyzing {} news items", valid.len());
        let results = match self.classifier.classify(&valid).await {
            Ok(results) => results,
            Err(e) => {
                self.metrics.record_classifier_dropped(valid.len() as u64);
                return Err(AppError::External(format!("classification failed: {e}")));
            }
        };

        // The classifier must return one result per item, in order. Anything
        // else would merge verdicts onto the wrong items.
        if results.len() != valid.len() {
            self.metrics.record_classifier_dropped(valid.len() as u64);
            return Err(AppError::External(format!(
                "classifier returned {} results for {} items",
                results.len(),
                valid.len()
            )));
        }

        for (item, analysis) in valid.iter_mut().zip(results.iter()) {
            item.apply_analysis(analysis);
        }

        let records: Vec<StoredRecord> = valid
            .iter()
            .map(StoredRecord::from_item)
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::External(format!("record projection failed: {e}")))?;

        let report = self.writer.write_all(records).await;
        self.metrics.record_persisted(report.persisted as u64);
        if report.lost > 0 {
            self.metrics.record_lost(report.lost as u64);
        }

        info!(
            "Batch persisted: {} written, {} lost, {} dropped pre-analysis",
            report.persisted, report.lost, dropped
        );
        Ok(report.persisted)
    }

    /// Fetch article text for every item lacking it, fanning out under the
    /// concurrency limiter. A failed fetch leaves that item without content.
    async fn fetch_missing_content(&self, items: &mut [NewsItem]) {
        let fetches: Vec<_> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.content.is_none())
            .map(|(index, item)| {
                let url = item.url.clone();
                let source = item.source.clone();
                async move {
                    let _slot = self.fetch_limiter.acquire().await;
                    let fetcher = self.registry.for_source(&source);
                    match fetcher.fetch(&url).await {
                        Ok(text) => (index, Some(text)),
                        Err(e) => {
                            warn!("Content fetch failed ({}): {} -> {}", source, url, e);
                            self.metrics.record_fetch_failure(&source);
                            (index, None)
                        }
                    }
                }
            })
            .collect();

        for (index, content) in join_all(fetches).await {
            items[index].content = content;
        }
    }
}

#[async_trait]
impl BatchProcessor for EnrichmentService {
    async fn process_batch(&self, items: Vec<NewsItem>) -> Result<usize, AppError> {
        self.run_batch(items).await
    }
}

fn is_valid_content(content: Option<&str>, min_len: usize) -> bool {
    content
        .map(|text| text.trim().chars().count() >= min_len)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BatchWriter, WriterConfig};
    use crate::external::article_fetcher::{ArticleFetcher, FetchError};
    use crate::external::classifier::ClassifierError;
    use crate::models::{ClassificationResult, Sentiment};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Duration;

    fn item(id: i64, content: Option<&str>) -> NewsItem {
        NewsItem {
            id,
            symbol: "AAPL".to_string(),
            published_at: 1_700_000_000 + id,
            headline: format!("headline {id}"),
            summary: String::new(),
            url: format!("https://example.com/{id}"),
            source: "Yahoo".to_string(),
            category: "general".to_string(),
            image: String::new(),
            content: content.map(|c| c.to_string()),
            sentiment: None,
            importance: None,
            ai_summary: None,
        }
    }

    struct FixedFetcher {
        response: Result<String, ()>,
    }

    #[async_trait]
    impl ArticleFetcher for FixedFetcher {
        fn label(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.response
                .clone()
                .map_err(|_| FetchError::Network("down".to_string()))
        }
    }

    enum ClassifierMode {
        Aligned,
        Fail,
        OneShort,
    }

    struct MockClassifier {
        mode: ClassifierMode,
        calls: AtomicUsize,
    }

    impl MockClassifier {
        fn new(mode: ClassifierMode) -> Self {
            Self {
                mode,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NewsClassifier for MockClassifier {
        async fn classify(
            &self,
            items: &[NewsItem],
        ) -> Result<Vec<ClassificationResult>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                ClassifierMode::Fail => Err(ClassifierError::Network("down".to_string())),
                ClassifierMode::Aligned => Ok(items
                    .iter()
                    .map(|_| ClassificationResult {
                        sentiment: Sentiment::Positive,
                        importance: 7,
                        summary: "ok".to_string(),
                    })
                    .collect()),
                ClassifierMode::OneShort => Ok(items
                    .iter()
                    .skip(1)
                    .map(|_| ClassificationResult {
                        sentiment: Sentiment::Neutral,
                        importance: 1,
                        summary: String::new(),
                    })
                    .collect()),
            }
        }
    }

    struct MemoryStore {
        records: Mutex<Vec<StoredRecord>>,
        write_calls: AtomicUsize,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                write_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl crate::db::NewsStore for MemoryStore {
        async fn put(&self, record: &StoredRecord) -> Result<(), crate::db::StoreError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn batch_put(
            &self,
            records: &[StoredRecord],
        ) -> Result<Vec<StoredRecord>, crate::db::StoreError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            self.records.lock().unwrap().extend_from_slice(records);
            Ok(Vec::new())
        }

        async fn query_range(
            &self,
            _symbol: &str,
            _from_ts: i64,
            _to_ts: i64,
            _min_importance: Option<i32>,
        ) -> Result<Vec<StoredRecord>, crate::db::StoreError> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        service: EnrichmentService,
        store: Arc<MemoryStore>,
        metrics: Arc<PipelineMetrics>,
    }

    fn harness(fetch: Result<String, ()>, mode: ClassifierMode) -> Harness {
        let registry = Arc::new(FetcherRegistry::new(Arc::new(FixedFetcher {
            response: fetch,
        })));
        let store = Arc::new(MemoryStore::new());
        let writer = Arc::new(BatchWriter::new(
            store.clone(),
            WriterConfig {
                base_backoff: Duration::from_millis(1),
                max_jitter: Duration::ZERO,
                ..WriterConfig::default()
            },
        ));
        let metrics = Arc::new(PipelineMetrics::new());
        let service = EnrichmentService::new(
            registry,
            Arc::new(MockClassifier::new(mode)),
            writer,
            metrics.clone(),
            EnrichmentConfig::default(),
        );
        Harness {
            service,
            store,
            metrics,
        }
    }

    const LONG: &str = "This article body is comfortably longer than the fifty character validity threshold used by the pipeline.";

    #[test]
    fn content_filter_thresholds() {
        assert!(!is_valid_content(Some("short"), 50));
        assert!(!is_valid_content(None, 50));
        assert!(is_valid_content(Some(&"x".repeat(50)), 50));
        // Trimmed length is what counts
        assert!(!is_valid_content(Some(&format!("  {}  ", "x".repeat(48))), 50));
    }

    #[tokio::test]
    async fn persists_every_analyzed_item_exactly_once() {
        let h = harness(Ok(LONG.to_string()), ClassifierMode::Aligned);
        let persisted = h
            .service
            .process_batch(vec![item(1, Some(LONG)), item(2, Some(LONG)), item(3, None)])
            .await
            .unwrap();

        assert_eq!(persisted, 3);
        assert_eq!(h.store.records.lock().unwrap().len(), 3);
        assert_eq!(h.store.write_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.metrics.snapshot().persisted, 3);
    }

    #[tokio::test]
    async fn short_and_missing_content_is_dropped() {
        let h = harness(Err(()), ClassifierMode::Aligned);
        let persisted = h
            .service
            .process_batch(vec![
                item(1, Some("short")),
                item(2, Some(LONG)),
                item(3, None), // fetch fails -> no content
            ])
            .await
            .unwrap();

        assert_eq!(persisted, 1);
        let snap = h.metrics.snapshot();
        assert_eq!(snap.invalid_dropped, 2);
        assert_eq!(snap.fetch_failures.get("Yahoo"), Some(&1));
    }

    #[tokio::test]
    async fn empty_filtered_batch_is_a_quiet_no_op() {
        let h = harness(Err(()), ClassifierMode::Aligned);
        let persisted = h
            .service
            .process_batch(vec![item(1, Some("tiny")), item(2, None)])
            .await
            .unwrap();

        assert_eq!(persisted, 0);
        assert_eq!(h.store.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn classifier_failure_abandons_the_batch() {
        let h = harness(Ok(LONG.to_string()), ClassifierMode::Fail);
        let result = h
            .service
            .process_batch(vec![item(1, Some(LONG)), item(2, Some(LONG))])
            .await;

        assert!(result.is_err());
        assert_eq!(h.store.write_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.metrics.snapshot().classifier_dropped, 2);
    }

    #[tokio::test]
    async fn result_count_mismatch_fails_fast() {
        let h = harness(Ok(LONG.to_string()), ClassifierMode::OneShort);
        let result = h
            .service
            .process_batch(vec![item(1, Some(LONG)), item(2, Some(LONG))])
            .await;

        assert!(result.is_err());
        assert_eq!(h.store.records.lock().unwrap().len(), 0, "no partial merge");
    }

    #[tokio::test]
    async fn merged_fields_come_from_the_classifier() {
        let h = harness(Ok(LONG.to_string()), ClassifierMode::Aligned);
        h.service
            .process_batch(vec![item(1, Some(LONG))])
            .await
            .unwrap();

        let records = h.store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].importance, Some(7));
        assert_eq!(records[0].payload["sentiment"], "POSITIVE");
    }
}
