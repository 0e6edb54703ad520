use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::external::classifier::{ClassifierError, NewsClassifier};
use crate::models::{ClassificationResult, NewsItem, Sentiment};

/// Configuration for the OpenAI-backed classifier
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ClassifierConfig {
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY is not set".to_string())?;
        Ok(Self {
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_tokens: 2000,
            temperature: 0.0,
        })
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

/// The JSON shape the model is instructed to emit
#[derive(Debug, Deserialize)]
struct BatchVerdicts {
    results: Vec<RawVerdict>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    sentiment: String,
    importance: i32,
    #[serde(default)]
    summary: String,
}

const SYSTEM_PROMPT: &str = r#"You are a senior financial news analyst with 20 years of Wall Street experience. You will receive a numbered list of news articles about the stock {symbol}. For EACH article, in the same order, judge:

1. sentiment - the likely effect on {symbol}'s share price:
   POSITIVE (earnings beats, M&A, product wins, target upgrades),
   NEGATIVE (missed earnings, regulation, lawsuits, damaging rumors),
   NEUTRAL (no price impact, generic market commentary, plain price moves).
2. importance - an integer 1-10 for expected price impact:
   9-10 mega events (M&A, earnings surprise/shock, CEO change, trading halt),
   7-8 major events (product launches, large contracts, analyst rating changes),
   4-6 ordinary events (sector moves, competitor news, routine earnings),
   1-3 minor items (price-move recaps, promotional pieces, old news).
3. summary - one sentence covering cause and effect, naming {symbol}.

Respond with ONLY this JSON, no markdown fences, no extra text:
{"results": [{"sentiment": "...", "importance": 0, "summary": "..."}, ...]}
The results array MUST contain exactly one entry per input article, in input order."#;

/// Max characters of article body included per item in the prompt
const MAX_CONTENT_CHARS: usize = 1500;

/// OpenAI chat-completions batch classifier.
///
/// Sends the whole batch in one call and parses the strict-JSON verdict
/// list. Order alignment is the model's responsibility; the enrichment
/// layer validates the count.
pub struct OpenAiClassifier {
    config: ClassifierConfig,
    client: Client,
}

impl OpenAiClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    fn build_user_prompt(items: &[NewsItem]) -> String {
        let mut prompt = String::new();
        for (index, item) in items.iter().enumerate() {
            let content = item.content.as_deref().unwrap_or("");
            let truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
            prompt.push_str(&format!(
                "[Article {}]\nHeadline: {}\nBody: {}\n{}\n",
                index + 1,
                item.headline,
                truncated,
                "-".repeat(30)
            ));
        }
        prompt
    }
}

#[async_trait]
impl NewsClassifier for OpenAiClassifier {
    async fn classify(
        &self,
        items: &[NewsItem],
    ) -> Result<Vec<ClassificationResult>, ClassifierError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let symbol = items[0].symbol.as_str();
        info!("Classifying batch of {} items for {}", items.len(), symbol);

        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.replace("{symbol}", symbol),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: Self::build_user_prompt(items),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::BadResponse(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| ClassifierError::BadResponse("empty choices".to_string()))?;

        parse_verdicts(content)
    }
}

/// Parse the model's JSON verdict list, tolerating markdown code fences.
fn parse_verdicts(content: &str) -> Result<Vec<ClassificationResult>, ClassifierError> {
    let cleaned = strip_code_fences(content);
    let verdicts: BatchVerdicts =
        serde_json::from_str(cleaned).map_err(|e| ClassifierError::Parse(e.to_string()))?;

    Ok(verdicts
        .results
        .into_iter()
        .map(|raw| {
            let sentiment = match raw.sentiment.to_uppercase().as_str() {
                "POSITIVE" => Sentiment::Positive,
                "NEGATIVE" => Sentiment::Negative,
                _ => Sentiment::Neutral,
            };
            ClassificationResult::clamped(sentiment, raw.importance, raw.summary)
        })
        .collect())
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
