//! Core data models used throughout trendradar.
//!
//! These types represent the raw records adapters produce, the canonical
//! items stored in SQLite, and the source/keyword/bookmark records that
//! drive fetching and ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw record produced by an adapter before normalization.
///
/// Every field is optional; [`crate::normalize::normalize`] fills in the
/// defaults. Empty strings are treated the same as missing values.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    /// Source-local identifier. When absent, a hash of title + url is used.
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub stars: Option<i64>,
    pub score: Option<f64>,
    pub published_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

/// Canonical aggregation unit, keyed by `{source_id}-{local_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// Id of the configured source that produced this item.
    pub source: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub author: Option<String>,
    pub stars: i64,
    pub score: f64,
    pub published_at: DateTime<Utc>,
    pub metadata: Value,
}

/// An [`Item`] as read back from the store, with store-managed columns.
#[derive(Debug, Clone, Serialize)]
pub struct StoredItem {
    #[serde(flatten)]
    pub item: Item,
    /// Set when the item is bookmarked.
    pub bookmark_id: Option<i64>,
    /// Insertion time of the first write for this id.
    pub created_at: DateTime<Utc>,
}

/// A query result row: the stored item plus its keyword relevance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    #[serde(flatten)]
    pub item: StoredItem,
    pub relevance_score: f64,
}

impl RankedItem {
    /// Stored base score plus keyword relevance.
    pub fn combined_score(&self) -> f64 {
        self.item.item.score + self.relevance_score
    }
}

/// A configured data source plus its fetch state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Adapter kind tag (`rss`, `github`, `huggingface`, `mcp`, `changelog`).
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_rate_limit_minutes")]
    pub rate_limit_minutes: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Adapter-specific settings.
    #[serde(default = "empty_object")]
    pub config: Value,
}

pub fn default_rate_limit_minutes() -> i64 {
    60
}

fn default_enabled() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Source {
    /// Build a source with default rate limit, enabled, never fetched.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: kind.into(),
            url: url.into(),
            rate_limit_minutes: default_rate_limit_minutes(),
            enabled: true,
            last_fetched_at: None,
            config: empty_object(),
        }
    }

    /// Replace the adapter config bag.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Read a string setting from the config bag.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Read an unsigned integer setting from the config bag.
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(Value::as_u64)
    }

    /// Read a list of strings from the config bag.
    pub fn config_str_list(&self, key: &str) -> Option<Vec<String>> {
        self.config.get(key).and_then(Value::as_array).map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }
}

/// Relevance keyword with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    pub weight: f64,
}

/// A bookmark joined with the item it annotates.
#[derive(Debug, Clone, Serialize)]
pub struct Bookmark {
    pub id: i64,
    pub item_id: String,
    pub note: Option<String>,
    pub tags: Vec<String>,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub source: String,
}

/// A named, persisted filter/sort combination.
#[derive(Debug, Clone, Serialize)]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub query: Option<String>,
    pub filters: Value,
    pub sort_by: Option<String>,
    pub created_at: DateTime<Utc>,
}
