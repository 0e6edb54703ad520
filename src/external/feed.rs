use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::NewsItem;

/// Configuration for the Finnhub metadata feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_key: String,
    pub base_url: String,
}

impl FeedConfig {
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("FINNHUB_API_KEY")
            .map_err(|_| "FINNHUB_API_KEY is not set".to_string())?;
        let base_url = std::env::var("FINNHUB_BASE_URL")
            .unwrap_or_else(|_| "https://finnhub.io/api/v1".to_string());
        Ok(Self { api_key, base_url })
    }
}

/// Raw company-news record as Finnhub returns it
#[derive(Debug, Deserialize)]
struct FeedRecord {
    id: i64,
    datetime: i64,
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    image: String,
}

/// Finnhub company-news client.
///
/// The feed is treated as unreliable: any HTTP or decode failure is logged
/// and degrades to an empty list, never an error to the caller.
pub struct FinnhubFeed {
    config: FeedConfig,
    client: Client,
}

impl FinnhubFeed {
    pub fn new(config: FeedConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Fetch raw news records for one symbol over an inclusive date range.
    pub async fn company_news(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Vec<NewsItem> {
        info!(
            "Collecting news for {} from {} to {}",
            symbol, from_date, to_date
        );

        let url = format!("{}/company-news", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("from", &from_date.format("%Y-%m-%d").to_string()),
                ("to", &to_date.format("%Y-%m-%d").to_string()),
                ("token", &self.config.api_key),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("Feed request failed for {}: {}", symbol, e);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(
                "Feed returned HTTP {} for {}",
                response.status().as_u16(),
                symbol
            );
            return Vec::new();
        }

        let records: Vec<FeedRecord> = match response.json().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to decode feed response for {}: {}", symbol, e);
                return Vec::new();
            }
        };

        records
            .into_iter()
            .map(|raw| raw.into_item(symbol))
            .collect()
    }
}

impl FeedRecord {
    // The feed omits the symbol on company-news responses, so the caller's
    // symbol is injected here.
    fn into_item(self, symbol: &str) -> NewsItem {
        NewsItem {
            id: self.id,
            symbol: symbol.to_string(),
            published_at: self.datetime,
            headline: self.headline,
            summary: self.summary,
            url: self.url,
            source: self.source,
            category: if self.category.is_empty() {
                "general".to_string()
            } else {
                self.category
            },
            image: self.image,
            content: None,
            sentiment: None,
            importance: None,
            ai_summary: None,
        }
    }
}
