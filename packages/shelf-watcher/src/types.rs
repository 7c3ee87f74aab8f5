use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `<item>` from the shelf feed, as seen in a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Stable key: the item's guid, or its link when the guid is missing.
    /// Empty when the item carries neither.
    pub identity: String,
    pub title: String,
}

impl FeedItem {
    pub fn new(identity: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            title: title.into(),
        }
    }

    /// Items without an identity can't be deduplicated and are never stored.
    pub fn is_processable(&self) -> bool {
        !self.identity.is_empty()
    }
}

/// Durable record that an item was handed to the downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub identity: String,
    pub title: String,
    pub processed_at: DateTime<Utc>,
}
