use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad status: {0}")]
    BadStatus(u16),
}

/// Capability for turning an article URL into extracted body text.
///
/// A fetch may legitimately return an empty string (paywall, consent page,
/// unrecognized markup); that is not an error. Errors are reserved for
/// transport failures.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Extraction rule set identifier, for logs and routing checks
    fn label(&self) -> &str;

    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Routes a news source label to the fetcher carrying that site's
/// extraction rules.
///
/// Labels are normalized (lowercased, spaces stripped) and matched by
/// substring against the registered keys in insertion order, so
/// "Yahoo Finance" and "Yahoo" both land on the `yahoo` entry. Sources with
/// no matching entry get the default fetcher.
pub struct FetcherRegistry {
    entries: Vec<(&'static str, Arc<dyn ArticleFetcher>)>,
    default: Arc<dyn ArticleFetcher>,
}

impl FetcherRegistry {
    pub fn new(default: Arc<dyn ArticleFetcher>) -> Self {
        Self {
            entries: Vec::new(),
            default,
        }
    }

    pub fn register(mut self, key: &'static str, fetcher: Arc<dyn ArticleFetcher>) -> Self {
        self.entries.push((key, fetcher));
        self
    }

    pub fn for_source(&self, source: &str) -> &Arc<dyn ArticleFetcher> {
        let normalized = source.to_lowercase().replace(' ', "");
        self.entries
            .iter()
            .find(|(key, _)| normalized.contains(key))
            .map(|(_, fetcher)| fetcher)
            .unwrap_or(&self.default)
    }
}
