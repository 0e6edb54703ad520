use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ClassificationResult, NewsItem};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Batch sentiment/importance scoring capability.
///
/// Contract: the returned results are order-aligned with the input, one per
/// item. Callers treat a length mismatch as a contract violation and must
/// fail fast rather than zip results onto the wrong items.
#[async_trait]
pub trait NewsClassifier: Send + Sync {
    async fn classify(
        &self,
        items: &[NewsItem],
    ) -> Result<Vec<ClassificationResult>, ClassifierError>;
}
