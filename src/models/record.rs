use serde::{Deserialize, Serialize};

use crate::models::news::NewsItem;

/// Low sentinel appended to the range start so the window includes every id
/// at the starting timestamp.
const SORT_KEY_LOW_SENTINEL: &str = "000000000";
/// High sentinel appended to the range end; any real id at that timestamp
/// sorts at or below it.
const SORT_KEY_HIGH_SENTINEL: &str = "999999999";

/// The persisted projection of a [`NewsItem`].
///
/// Records share a partition per symbol and order by sort key, so a
/// timestamp window maps onto a lexicographic sort-key range. Timestamps are
/// zero-padded to a fixed 10 digits to keep lexicographic order equal to
/// numeric order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredRecord {
    pub pk: String,
    pub sk: String,
    pub symbol: String,
    pub importance: Option<i32>,
    pub payload: serde_json::Value,
}

/// Partition key: `STOCK#{symbol}`
pub fn partition_key(symbol: &str) -> String {
    format!("STOCK#{symbol}")
}

/// Sort key: `NEWS#{timestamp}#{id}`, timestamp zero-padded to 10 digits
pub fn sort_key(published_at: i64, id: i64) -> String {
    format!("NEWS#{published_at:010}#{id}")
}

/// Inclusive sort-key bounds for the timestamp window `[from, to]`,
/// irrespective of the trailing id.
pub fn sort_key_range(from: i64, to: i64) -> (String, String) {
    (
        format!("NEWS#{from:010}#{SORT_KEY_LOW_SENTINEL}"),
        format!("NEWS#{to:010}#{SORT_KEY_HIGH_SENTINEL}"),
    )
}

impl StoredRecord {
    /// Project an analyzed item into its store representation. The payload
    /// keeps the full item (unset optional fields are omitted).
    pub fn from_item(item: &NewsItem) -> Result<Self, serde_json::Error> {
        Ok(Self {
            pk: partition_key(&item.symbol),
            sk: sort_key(item.published_at, item.id),
            symbol: item.symbol.clone(),
            importance: item.importance,
            payload: serde_json::to_value(item)?,
        })
    }
}
