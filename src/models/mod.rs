mod news;
mod record;

pub use news::{ClassificationResult, NewsItem, Sentiment};
pub use record::{partition_key, sort_key, sort_key_range, StoredRecord};
