//! Storage abstraction for trendradar.
//!
//! The [`ItemStore`] trait is the contract the fetch orchestrator and the
//! query composer rely on: idempotent upsert keyed by item id, a
//! multi-criterion query surface, keyword lookup, and source fetch state.
//!
//! Implementations must be `Send + Sync` to work with async runtimes, must
//! serialize concurrent upserts of the same id (last write wins), and must
//! never expose a partially written item to readers.

pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::models::{Item, Keyword, Source, StoredItem};

/// Stored field to order query results by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Score,
    PublishedAt,
    Stars,
    Title,
    Source,
    CreatedAt,
}

impl SortKey {
    /// Column name in the `items` table.
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Score => "score",
            SortKey::PublishedAt => "published_at",
            SortKey::Stars => "stars",
            SortKey::Title => "title",
            SortKey::Source => "source",
            SortKey::CreatedAt => "created_at",
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "score" => SortKey::Score,
            "published_at" | "publishedAt" | "date" => SortKey::PublishedAt,
            "stars" => SortKey::Stars,
            "title" => SortKey::Title,
            "source" => SortKey::Source,
            "created_at" | "createdAt" => SortKey::CreatedAt,
            other => bail!(
                "Unknown sort key: '{}'. Use score, published_at, stars, title, source, or created_at.",
                other
            ),
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => bail!("Unknown sort order: '{}'. Use ASC or DESC.", s),
        }
    }
}

/// Filter, sort, and pagination parameters for [`ItemStore::query_items`].
///
/// Ranges are inclusive. `None` means "no restriction".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    pub sources: Option<Vec<String>>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
    pub bookmarks_only: bool,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            sources: None,
            search: None,
            date_from: None,
            date_to: None,
            score_min: None,
            score_max: None,
            bookmarks_only: false,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            limit: 100,
            offset: 0,
        }
    }
}

impl ItemFilter {
    /// Non-empty lowercase search terms, if any.
    pub fn search_terms(&self) -> Vec<String> {
        self.search
            .as_deref()
            .map(search_terms)
            .unwrap_or_default()
    }
}

/// Split free text into lowercase whitespace-delimited terms.
pub fn search_terms(text: &str) -> Vec<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

/// Abstract storage backend for items, sources, and keywords.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_items`](ItemStore::upsert_items) | Insert or overwrite items by id |
/// | [`query_items`](ItemStore::query_items) | Filtered, sorted, paginated read |
/// | [`count_items`](ItemStore::count_items) | Total stored items |
/// | [`get_keywords`](ItemStore::get_keywords) | Relevance keywords |
/// | [`enabled_sources`](ItemStore::enabled_sources) | Sources eligible for fetching |
/// | [`mark_source_fetched`](ItemStore::mark_source_fetched) | Advance `last_fetched_at` |
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert or overwrite each item keyed by `id`.
    ///
    /// Returns the number of rows written or updated. Applying the same
    /// item twice leaves one row holding the latest values.
    async fn upsert_items(&self, items: &[Item]) -> Result<usize>;

    /// Read items matching `filter`, ordered and paginated by the store.
    async fn query_items(&self, filter: &ItemFilter) -> Result<Vec<StoredItem>>;

    /// Total number of stored items, ignoring any filter.
    async fn count_items(&self) -> Result<i64>;

    async fn get_keywords(&self) -> Result<Vec<Keyword>>;

    /// All sources with `enabled = true`, ordered by id.
    async fn enabled_sources(&self) -> Result<Vec<Source>>;

    /// Record a fetch attempt. `last_fetched_at` never moves backwards.
    async fn mark_source_fetched(&self, source_id: &str, at: DateTime<Utc>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("score".parse::<SortKey>().unwrap(), SortKey::Score);
        assert_eq!("publishedAt".parse::<SortKey>().unwrap(), SortKey::PublishedAt);
        assert_eq!("published_at".parse::<SortKey>().unwrap(), SortKey::PublishedAt);
        assert!("bogus".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_sort_order_parse_case_insensitive() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("up".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_search_terms() {
        assert_eq!(search_terms("  Rust  LLM "), vec!["rust", "llm"]);
        assert!(search_terms("   ").is_empty());
    }
}
