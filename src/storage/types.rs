use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while persisting the store.
///
/// Loading never fails: an absent or corrupt store file is treated as empty.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Media attached to an item, either from the feed or an `og:image` preview.
///
/// All three fields are kept as received; missing attributes are empty
/// strings. An enclosure is only rendered when `url` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub length: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

impl Enclosure {
    pub fn has_media(&self) -> bool {
        !self.url.is_empty()
    }
}

/// An item as extracted from the remote feed, before it enters the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    /// Normalized identifier. Empty means the item cannot be stored.
    pub guid: String,
    pub title: String,
    pub link: String,
    /// Raw text, possibly HTML; never re-escaped or trimmed.
    pub description: String,
    pub enclosure: Option<Enclosure>,
    /// Publication date exactly as it appeared in the feed.
    pub pub_date_raw: String,
    pub pub_date: Option<DateTime<Utc>>,
}

/// A persisted store entry.
///
/// Serialized field names follow the store file format shared with earlier
/// versions of the mirror (`pubDate_raw`, `pubDate`, `fetched_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub guid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enclosure: Option<Enclosure>,
    #[serde(rename = "pubDate_raw", default)]
    pub pub_date_raw: String,
    #[serde(rename = "pubDate", default)]
    pub pub_date: Option<DateTime<Utc>>,
    /// First time this guid was seen. Never changes after insertion.
    pub fetched_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Creates a record for a guid seen for the first time.
    pub fn first_seen(item: ParsedItem, now: DateTime<Utc>) -> Self {
        Self {
            guid: item.guid,
            title: item.title,
            link: item.link,
            description: item.description,
            enclosure: item.enclosure,
            pub_date_raw: item.pub_date_raw,
            pub_date: item.pub_date,
            fetched_at: now,
        }
    }

    /// Replaces every field except `guid` and `fetched_at`.
    ///
    /// This is a full replace, not a sparse patch: empty or absent incoming
    /// values overwrite what was stored.
    pub fn refresh_from(&mut self, item: ParsedItem) {
        self.title = item.title;
        self.link = item.link;
        self.description = item.description;
        self.enclosure = item.enclosure;
        self.pub_date_raw = item.pub_date_raw;
        self.pub_date = item.pub_date;
    }

    /// Ordering key for the rendered feed: publication date, else first-seen time.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.pub_date.unwrap_or(self.fetched_at)
    }
}

/// Counters returned by [`Store::upsert`](super::Store::upsert).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
    /// Items dropped because their guid was empty.
    pub skipped: usize,
}
