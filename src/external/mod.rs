pub mod article_fetcher;
pub mod classifier;
pub mod extractors;
pub mod feed;
pub mod openai_classifier;
