//! In-memory [`ItemStore`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Text search is a case-insensitive substring match of every term against
//! title + description.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Item, Keyword, Source, StoredItem};

use super::{ItemFilter, ItemStore, SortKey, SortOrder};

struct StoredRow {
    item: Item,
    created_at: DateTime<Utc>,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    items: RwLock<HashMap<String, StoredRow>>,
    bookmarks: RwLock<HashSet<String>>,
    keywords: RwLock<Vec<Keyword>>,
    sources: RwLock<Vec<Source>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            bookmarks: RwLock::new(HashSet::new()),
            keywords: RwLock::new(Vec::new()),
            sources: RwLock::new(Vec::new()),
        }
    }

    /// Add or replace a source (matched by id).
    pub fn put_source(&self, source: Source) {
        let mut sources = write(&self.sources);
        sources.retain(|s| s.id != source.id);
        sources.push(source);
    }

    /// Current state of a source, if known.
    pub fn source(&self, id: &str) -> Option<Source> {
        read(&self.sources).iter().find(|s| s.id == id).cloned()
    }

    pub fn add_keyword(&self, keyword: &str, weight: f64) {
        write(&self.keywords).push(Keyword {
            keyword: keyword.to_string(),
            weight,
        });
    }

    pub fn bookmark(&self, item_id: &str) {
        write(&self.bookmarks).insert(item_id.to_string());
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn matches(item: &Item, filter: &ItemFilter, terms: &[String], bookmarked: bool) -> bool {
    if let Some(ref sources) = filter.sources {
        if !sources.iter().any(|s| s == &item.source) {
            return false;
        }
    }
    if !terms.is_empty() {
        let text = format!("{} {}", item.title, item.description).to_lowercase();
        if !terms.iter().all(|t| text.contains(t.as_str())) {
            return false;
        }
    }
    if filter.date_from.is_some_and(|from| item.published_at < from) {
        return false;
    }
    if filter.date_to.is_some_and(|to| item.published_at > to) {
        return false;
    }
    if filter.score_min.is_some_and(|min| item.score < min) {
        return false;
    }
    if filter.score_max.is_some_and(|max| item.score > max) {
        return false;
    }
    !filter.bookmarks_only || bookmarked
}

fn compare(a: &StoredRow, b: &StoredRow, key: SortKey) -> Ordering {
    match key {
        SortKey::Score => a.item.score.partial_cmp(&b.item.score).unwrap_or(Ordering::Equal),
        SortKey::PublishedAt => a.item.published_at.timestamp().cmp(&b.item.published_at.timestamp()),
        SortKey::Stars => a.item.stars.cmp(&b.item.stars),
        SortKey::Title => a.item.title.cmp(&b.item.title),
        SortKey::Source => a.item.source.cmp(&b.item.source),
        SortKey::CreatedAt => a.created_at.timestamp().cmp(&b.created_at.timestamp()),
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn upsert_items(&self, items: &[Item]) -> Result<usize> {
        let now = Utc::now();
        let mut stored = write(&self.items);
        for item in items {
            let created_at = stored.get(&item.id).map(|r| r.created_at).unwrap_or(now);
            stored.insert(
                item.id.clone(),
                StoredRow {
                    item: item.clone(),
                    created_at,
                },
            );
        }
        Ok(items.len())
    }

    async fn query_items(&self, filter: &ItemFilter) -> Result<Vec<StoredItem>> {
        let terms = filter.search_terms();
        let stored = read(&self.items);
        let bookmarks = read(&self.bookmarks);

        let mut rows: Vec<&StoredRow> = stored
            .values()
            .filter(|r| matches(&r.item, filter, &terms, bookmarks.contains(&r.item.id)))
            .collect();

        rows.sort_by(|a, b| {
            let primary = compare(a, b, filter.sort_by);
            let primary = match filter.sort_order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.item.id.cmp(&b.item.id))
        });

        // Bookmark ids are synthetic here; only presence matters.
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .map(|r| StoredItem {
                item: r.item.clone(),
                bookmark_id: bookmarks.contains(&r.item.id).then_some(1),
                created_at: r.created_at,
            })
            .collect())
    }

    async fn count_items(&self) -> Result<i64> {
        Ok(read(&self.items).len() as i64)
    }

    async fn get_keywords(&self) -> Result<Vec<Keyword>> {
        Ok(read(&self.keywords).clone())
    }

    async fn enabled_sources(&self) -> Result<Vec<Source>> {
        let mut sources: Vec<Source> = read(&self.sources)
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sources)
    }

    async fn mark_source_fetched(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut sources = write(&self.sources);
        if let Some(source) = sources.iter_mut().find(|s| s.id == source_id) {
            source.last_fetched_at = Some(match source.last_fetched_at {
                Some(prev) if prev > at => prev,
                _ => at,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawItem;
    use crate::normalize::normalize;
    use chrono::Duration;

    fn item(title: &str, score: f64) -> Item {
        normalize(
            RawItem {
                title: Some(title.to_string()),
                url: Some(format!("https://example.com/{}", title)),
                score: Some(score),
                ..Default::default()
            },
            "src",
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let a = item("alpha", 1.0);
        store.upsert_items(&[a.clone()]).await.unwrap();
        store.upsert_items(&[a.clone()]).await.unwrap();
        assert_eq!(store.count_items().await.unwrap(), 1);

        let mut updated = a.clone();
        updated.score = 99.0;
        store.upsert_items(&[updated]).await.unwrap();
        let rows = store.query_items(&ItemFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item.score, 99.0);
    }

    #[tokio::test]
    async fn test_filters_and_sort() {
        let store = InMemoryStore::new();
        store
            .upsert_items(&[item("rust news", 10.0), item("python news", 20.0), item("rust tips", 30.0)])
            .await
            .unwrap();

        let filter = ItemFilter {
            search: Some("RUST".to_string()),
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let rows = store.query_items(&filter).await.unwrap();
        let titles: Vec<&str> = rows.iter().map(|r| r.item.title.as_str()).collect();
        assert_eq!(titles, vec!["rust news", "rust tips"]);

        let filter = ItemFilter {
            score_min: Some(20.0),
            score_max: Some(30.0),
            ..Default::default()
        };
        let rows = store.query_items(&filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item.score, 30.0);
    }

    #[tokio::test]
    async fn test_bookmarks_only() {
        let store = InMemoryStore::new();
        let a = item("a", 1.0);
        let b = item("b", 2.0);
        store.upsert_items(&[a.clone(), b]).await.unwrap();
        store.bookmark(&a.id);

        let filter = ItemFilter {
            bookmarks_only: true,
            ..Default::default()
        };
        let rows = store.query_items(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item.id, a.id);
        assert!(rows[0].bookmark_id.is_some());
    }

    #[tokio::test]
    async fn test_last_fetched_only_moves_forward() {
        let store = InMemoryStore::new();
        store.put_source(Source::new("s", "rss", "http://x"));
        let now = Utc::now();
        store.mark_source_fetched("s", now).await.unwrap();
        store
            .mark_source_fetched("s", now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(store.source("s").unwrap().last_fetched_at, Some(now));
    }
}
