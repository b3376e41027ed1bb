//! Query composition and keyword relevance ranking.
//!
//! Filters, sort key, and pagination go straight to the store, which
//! applies them natively. Keyword relevance is then added on top of the
//! page the store returned:
//!
//! ```text
//! relevance = Σ weight × 10   over keywords contained in "title description"
//! combined  = score + relevance
//! ```
//!
//! Only a score-sorted query is re-ordered by the combined value; any
//! other sort key keeps the store order untouched. The re-sort is stable,
//! so ties keep the store's order (`score`, then `id`).

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::config::{Config, QueryConfig};
use crate::models::{Item, Keyword, RankedItem, StoredItem};
use crate::saved_search;
use crate::store::sqlite::SqliteStore;
use crate::store::{ItemFilter, ItemStore, SortKey, SortOrder};

/// Ranked page returned by [`query_items`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub items: Vec<RankedItem>,
    pub count: usize,
}

/// [`QueryResult`] plus the store total and the filters that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ItemsPage {
    pub items: Vec<RankedItem>,
    pub count: usize,
    pub total: i64,
    pub filters: ItemFilter,
}

/// Keyword relevance of one item. Blank keywords never match.
pub fn calculate_relevance(item: &Item, keywords: &[Keyword]) -> f64 {
    let text = format!("{} {}", item.title, item.description).to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.keyword.trim().is_empty())
        .filter(|k| text.contains(&k.keyword.to_lowercase()))
        .map(|k| k.weight * 10.0)
        .sum()
}

/// Attach relevance to each row and, for score sorts, re-order by the
/// combined value in the requested direction.
pub fn rank_items(
    items: Vec<StoredItem>,
    keywords: &[Keyword],
    sort_by: SortKey,
    sort_order: SortOrder,
) -> Vec<RankedItem> {
    let mut ranked: Vec<RankedItem> = items
        .into_iter()
        .map(|item| {
            let relevance_score = calculate_relevance(&item.item, keywords);
            RankedItem {
                item,
                relevance_score,
            }
        })
        .collect();

    if sort_by == SortKey::Score {
        ranked.sort_by(|a, b| {
            let ord = a
                .combined_score()
                .partial_cmp(&b.combined_score())
                .unwrap_or(Ordering::Equal);
            match sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    ranked
}

/// Run `filter` against the store and rank the returned page.
pub async fn query_items(store: &dyn ItemStore, filter: &ItemFilter) -> Result<QueryResult> {
    let rows = store.query_items(filter).await?;
    let keywords = store.get_keywords().await?;
    let items = rank_items(rows, &keywords, filter.sort_by, filter.sort_order);
    Ok(QueryResult {
        count: items.len(),
        items,
    })
}

/// [`query_items`] plus the total stored count, echoing `filter`.
pub async fn query_page(store: &dyn ItemStore, filter: ItemFilter) -> Result<ItemsPage> {
    let result = query_items(store, &filter).await?;
    let total = store.count_items().await?;
    Ok(ItemsPage {
        items: result.items,
        count: result.count,
        total,
        filters: filter,
    })
}

/// Requested page size, defaulted and clamped to `[1, max_limit]`.
pub fn effective_limit(requested: Option<i64>, query: &QueryConfig) -> i64 {
    requested
        .unwrap_or(query.default_limit)
        .clamp(1, query.max_limit.max(1))
}

/// Parse a date bound: RFC 3339, or `YYYY-MM-DD` taken as the start
/// (or, with `end_of_day`, the last second) of that UTC day.
pub fn parse_date_bound(s: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") else {
        bail!("Invalid date '{}'. Use YYYY-MM-DD or RFC 3339.", s);
    };
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    match time {
        Some(t) => Ok(t.and_utc()),
        None => bail!("Invalid date '{}'", s),
    }
}

/// CLI entry point for `radar items`.
pub async fn run_items(config: &Config, filter: ItemFilter, json: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    if let Some(ref text) = filter.search {
        saved_search::record_search(store.pool(), text).await?;
    }
    let page = query_page(&store, filter).await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, ranked) in page.items.iter().enumerate() {
        let item = &ranked.item.item;
        println!(
            "{}. [{:.2}] {} / {}",
            page.filters.offset as usize + i + 1,
            ranked.combined_score(),
            item.source,
            item.title
        );
        println!("    published: {}", item.published_at.format("%Y-%m-%d"));
        println!(
            "    score: {:.2}  relevance: {:.2}  stars: {}",
            item.score, ranked.relevance_score, item.stars
        );
        if !item.url.is_empty() {
            println!("    url: {}", item.url);
        }
        if ranked.item.bookmark_id.is_some() {
            println!("    bookmarked");
        }
        println!("    id: {}", item.id);
        println!();
    }
    println!("{} of {} items", page.count, page.total);

    Ok(())
}
