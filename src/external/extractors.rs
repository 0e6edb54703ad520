use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::external::article_fetcher::{ArticleFetcher, FetchError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0 Safari/537.36";

/// Selector-driven article body extractor for one site family.
///
/// Selectors are tried in order; the first one that matches any nodes wins
/// and its paragraph texts are joined with spaces. No selector matching is
/// an empty result, not an error.
pub struct SiteExtractor {
    label: &'static str,
    client: Client,
    selectors: &'static [&'static str],
}

impl SiteExtractor {
    pub fn yahoo(client: Client) -> Self {
        Self {
            label: "yahoo",
            client,
            selectors: &[
                "div.bodyItems-wrapper p",
                "div.article-body p",
                "div.atoms-wrapper p",
            ],
        }
    }

    pub fn cnbc(client: Client) -> Self {
        Self {
            label: "cnbc",
            client,
            selectors: &["div.group p", "div.atoms-wrapper p"],
        }
    }

    pub fn default_rules(client: Client) -> Self {
        Self {
            label: "default",
            client,
            selectors: &[
                "div.atoms-wrapper p",
                "div.article-body p",
                "div.article-content p",
                "section.article-body p",
                "div#article-view-content p",
            ],
        }
    }
}

#[async_trait]
impl ArticleFetcher for SiteExtractor {
    fn label(&self) -> &str {
        self.label
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(extract_paragraphs(&html, self.selectors))
    }
}

/// Join the text of all nodes matching the first selector that hits.
///
/// Kept synchronous: `scraper::Html` is not `Send`, so it must never live
/// across an await point.
fn extract_paragraphs(html: &str, selectors: &[&str]) -> String {
    let document = Html::parse_document(html);

    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let texts: Vec<String> = document
            .select(&selector)
            .map(|node| node.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if !texts.is_empty() {
            return texts.join(" ");
        }
    }

    String::new()
}
