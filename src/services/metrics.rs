use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;
use serde::Serialize;

/// Counters for the ingestion pipeline's silent-drop paths.
///
/// The pipeline deliberately drops items instead of failing callers
/// (fetch errors, short content, abandoned classifier batches, lost store
/// chunks). These counters make those drops observable for monitoring and
/// for the test harness.
#[derive(Default)]
pub struct PipelineMetrics {
    enqueued: AtomicU64,
    batches_flushed: AtomicU64,
    invalid_dropped: AtomicU64,
    classifier_dropped: AtomicU64,
    persisted: AtomicU64,
    records_lost: AtomicU64,
    /// Fetch failures keyed by source label
    fetch_failures: DashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub batches_flushed: u64,
    pub invalid_dropped: u64,
    pub classifier_dropped: u64,
    pub persisted: u64,
    pub records_lost: u64,
    pub fetch_failures: HashMap<String, u64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self, count: u64) {
        self.enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_batch_flushed(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self, source: &str) {
        *self.fetch_failures.entry(source.to_string()).or_insert(0) += 1;
    }

    pub fn record_invalid_dropped(&self, count: u64) {
        self.invalid_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_classifier_dropped(&self, count: u64) {
        self.classifier_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_persisted(&self, count: u64) {
        self.persisted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_lost(&self, count: u64) {
        self.records_lost.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            invalid_dropped: self.invalid_dropped.load(Ordering::Relaxed),
            classifier_dropped: self.classifier_dropped.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            records_lost: self.records_lost.load(Ordering::Relaxed),
            fetch_failures: self
                .fetch_failures
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }
}
