use serde::{Deserialize, Serialize};

/// Sentiment classification produced by the news analyzer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "POSITIVE"),
            Sentiment::Negative => write!(f, "NEGATIVE"),
            Sentiment::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// A single news item flowing through the ingestion pipeline.
///
/// Identity is `(symbol, published_at, id)`; `id` alone is only unique
/// within the feed provider. The optional fields fill in as the item moves
/// from raw feed record to fetched to analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    /// Feed-assigned numeric id (dedup within a symbol partition)
    pub id: i64,
    pub symbol: String,
    /// Publication time as a unix timestamp (seconds)
    pub published_at: i64,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub image: String,
    /// Full article text, populated by the content fetch stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// Impact score on a 1-10 scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

impl NewsItem {
    /// Merge classifier output onto the item. Plain field assignment, so
    /// applying the same result twice leaves the item unchanged.
    pub fn apply_analysis(&mut self, analysis: &ClassificationResult) {
        self.sentiment = Some(analysis.sentiment);
        self.importance = Some(analysis.importance);
        self.ai_summary = Some(analysis.summary.clone());
    }

    /// An item may only be written to the store once analyzed
    pub fn is_analyzed(&self) -> bool {
        self.sentiment.is_some() && self.importance.is_some()
    }
}

/// One classifier verdict, order-aligned with the submitted batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub sentiment: Sentiment,
    pub importance: i32,
    pub summary: String,
}

impl ClassificationResult {
    /// Importance is a 1-10 integer scale; out-of-range model output is
    /// clamped rather than rejected.
    pub fn clamped(sentiment: Sentiment, importance: i32, summary: String) -> Self {
        Self {
            sentiment,
            importance: importance.clamp(1, 10),
            summary,
        }
    }
}
