//! End-to-end tests against a real SQLite file: fetch cycle persistence,
//! ranking, filters, bookmarks, saved searches, suggestions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use trendradar::bookmarks::{self, BookmarkOutcome, BookmarkUpdate};
use trendradar::config::{Config, HttpConfig};
use trendradar::http::HttpContext;
use trendradar::ingest::{run_fetch_cycle, SourceStatus};
use trendradar::keywords;
use trendradar::models::{Item, RawItem, Source, StoredItem};
use trendradar::normalize::normalize;
use trendradar::saved_search;
use trendradar::search::{query_items, query_page};
use trendradar::sources;
use trendradar::stats::collect_stats;
use trendradar::store::sqlite::SqliteStore;
use trendradar::store::{ItemFilter, ItemStore, SortKey, SortOrder};
use trendradar::traits::{AdapterRegistry, SourceAdapter};

async fn open_store() -> (TempDir, Config, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data/radar.sqlite"));
    let store = SqliteStore::open(&config).await.unwrap();
    (tmp, config, store)
}

fn item(source: &str, id: &str, title: &str, score: f64, days_ago: i64) -> Item {
    normalize(
        RawItem {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            url: Some(format!("https://example.com/{}", id)),
            description: Some(format!("{} description", title)),
            score: Some(score),
            stars: Some(score as i64),
            published_at: Some(Utc::now() - Duration::days(days_ago)),
            ..Default::default()
        },
        source,
    )
}

/// Emits the titles listed in `config.titles`; fails when `config.fail` is set.
struct ListAdapter {
    source: Source,
}

#[async_trait]
impl SourceAdapter for ListAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        if self.source.config.get("fail").is_some() {
            anyhow::bail!("upstream exploded");
        }
        let titles = self.source.config_str_list("titles").unwrap_or_default();
        Ok(titles
            .iter()
            .enumerate()
            .map(|(i, t)| item(&self.source.id, &i.to_string(), t, 10.0 * (i + 1) as f64, 0))
            .collect())
    }
}

fn list_registry() -> AdapterRegistry {
    let http = HttpContext::from_config(&HttpConfig::default()).unwrap();
    let mut registry = AdapterRegistry::new(http);
    registry.register("list", |source, _| {
        Box::new(ListAdapter {
            source: source.clone(),
        })
    });
    registry
}

#[tokio::test]
async fn test_fetch_cycle_persists_items_and_fetch_time() {
    let (_tmp, _config, store) = open_store().await;
    let pool = store.pool();

    sources::upsert_source(
        pool,
        &Source::new("alpha", "list", "").with_config(json!({"titles": ["one", "two"]})),
    )
    .await
    .unwrap();
    sources::upsert_source(
        pool,
        &Source::new("broken", "list", "").with_config(json!({"fail": true})),
    )
    .await
    .unwrap();

    let outcome = run_fetch_cycle(&store, &list_registry(), None).await.unwrap();
    assert_eq!(outcome.fetched, 2);
    assert_eq!(outcome.sources["alpha"], SourceStatus::Success { items: 2 });
    assert!(matches!(outcome.sources["broken"], SourceStatus::Error { .. }));
    assert_eq!(store.count_items().await.unwrap(), 2);

    let alpha = sources::get_source(pool, "alpha").await.unwrap().unwrap();
    assert!(alpha.last_fetched_at.is_some());
    let broken = sources::get_source(pool, "broken").await.unwrap().unwrap();
    assert!(broken.last_fetched_at.is_none());

    // Within the hour window the second cycle skips alpha
    let outcome = run_fetch_cycle(&store, &list_registry(), None).await.unwrap();
    assert_eq!(outcome.sources["alpha"], SourceStatus::RateLimited { items: 0 });
    assert_eq!(store.count_items().await.unwrap(), 2);
}

#[tokio::test]
async fn test_upsert_is_idempotent_last_write_wins() {
    let (_tmp, _config, store) = open_store().await;

    let first = item("src", "1", "Original title", 5.0, 1);
    store.upsert_items(&[first.clone()]).await.unwrap();
    let created = store.query_items(&ItemFilter::default()).await.unwrap()[0].created_at;

    let mut second = first.clone();
    second.title = "Updated title".to_string();
    second.score = 50.0;
    store.upsert_items(&[second.clone(), second.clone()]).await.unwrap();

    let rows = store.query_items(&ItemFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].item.title, "Updated title");
    assert_eq!(rows[0].item.score, 50.0);
    assert_eq!(rows[0].created_at, created);

    // Full-text index follows the rewrite
    let filter = ItemFilter {
        search: Some("original".into()),
        ..Default::default()
    };
    assert!(store.query_items(&filter).await.unwrap().is_empty());
    let filter = ItemFilter {
        search: Some("updated".into()),
        ..Default::default()
    };
    assert_eq!(store.query_items(&filter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_keyword_relevance_reorders_score_sort() {
    let (_tmp, _config, store) = open_store().await;
    keywords::upsert_keyword(store.pool(), "claude", 2.0).await.unwrap();

    store
        .upsert_items(&[
            item("a", "plain", "Generic tooling update", 100.0, 0),
            item("a", "match", "Claude desktop release", 100.0, 0),
            item("a", "high", "Unrelated but popular", 115.0, 0),
        ])
        .await
        .unwrap();

    let result = query_items(&store, &ItemFilter::default()).await.unwrap();
    let ids: Vec<&str> = result.items.iter().map(|r| r.item.item.id.as_str()).collect();
    assert_eq!(ids, vec!["a-match", "a-high", "a-plain"]);
    assert_eq!(result.items[0].relevance_score, 20.0);
    assert_eq!(result.items[0].combined_score(), 120.0);
    assert_eq!(result.count, 3);

    // Non-score sorts keep the store order
    let filter = ItemFilter {
        sort_by: SortKey::Title,
        sort_order: SortOrder::Asc,
        ..Default::default()
    };
    let result = query_items(&store, &filter).await.unwrap();
    let titles: Vec<&str> = result.items.iter().map(|r| r.item.item.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Claude desktop release", "Generic tooling update", "Unrelated but popular"]
    );
}

#[tokio::test]
async fn test_filters_combine() {
    let (_tmp, _config, store) = open_store().await;
    store
        .upsert_items(&[
            item("gh", "1", "Rust agent framework", 40.0, 1),
            item("gh", "2", "Python agent toolkit", 80.0, 10),
            item("hn", "3", "Rust compiler news", 60.0, 2),
            item("hn", "4", "Old rust post", 90.0, 400),
        ])
        .await
        .unwrap();

    let filter = ItemFilter {
        sources: Some(vec!["gh".into()]),
        search: Some("agent".into()),
        ..Default::default()
    };
    assert_eq!(store.query_items(&filter).await.unwrap().len(), 2);

    let filter = ItemFilter {
        search: Some("rust".into()),
        date_from: Some(Utc::now() - Duration::days(30)),
        ..Default::default()
    };
    let ids: Vec<String> = store
        .query_items(&filter)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.item.id)
        .collect();
    assert_eq!(ids, vec!["hn-3", "gh-1"]);

    let filter = ItemFilter {
        score_min: Some(50.0),
        score_max: Some(85.0),
        ..Default::default()
    };
    assert_eq!(store.query_items(&filter).await.unwrap().len(), 2);

    let filter = ItemFilter {
        date_to: Some(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()),
        ..Default::default()
    };
    assert!(store.query_items(&filter).await.unwrap().is_empty());

    // Pagination after ordering
    let filter = ItemFilter {
        limit: 2,
        offset: 1,
        ..Default::default()
    };
    let page = query_page(&store, filter).await.unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.total, 4);
    assert_eq!(page.items[0].item.item.id, "gh-2");
}

#[tokio::test]
async fn test_score_and_date_bounds_inclusive() {
    let (_tmp, _config, store) = open_store().await;
    let day = |d: u32| Utc.with_ymd_and_hms(2025, 6, d, 12, 0, 0).unwrap();
    let dated = |id: &str, score: f64, at| {
        let mut it = item("feed", id, &format!("Post {}", id), score, 0);
        it.published_at = at;
        it
    };
    store
        .upsert_items(&[
            dated("low", 20.0, day(1)),
            dated("edge-low", 30.0, day(2)),
            dated("mid", 45.5, day(3)),
            dated("edge-high", 60.0, day(4)),
            dated("high", 75.0, day(5)),
        ])
        .await
        .unwrap();

    let ids = |rows: Vec<StoredItem>| {
        let mut ids: Vec<String> = rows.into_iter().map(|r| r.item.id).collect();
        ids.sort();
        ids
    };

    let filter = ItemFilter {
        score_min: Some(30.0),
        score_max: Some(60.0),
        ..Default::default()
    };
    assert_eq!(
        ids(store.query_items(&filter).await.unwrap()),
        vec!["feed-edge-high", "feed-edge-low", "feed-mid"]
    );

    let filter = ItemFilter {
        date_from: Some(day(2)),
        date_to: Some(day(4)),
        ..Default::default()
    };
    assert_eq!(
        ids(store.query_items(&filter).await.unwrap()),
        vec!["feed-edge-high", "feed-edge-low", "feed-mid"]
    );

    // A single-instant window still matches the item on it
    let filter = ItemFilter {
        date_from: Some(day(3)),
        date_to: Some(day(3)),
        score_min: Some(45.5),
        score_max: Some(45.5),
        ..Default::default()
    };
    assert_eq!(ids(store.query_items(&filter).await.unwrap()), vec!["feed-mid"]);
}

#[tokio::test]
async fn test_bookmarks_lifecycle() {
    let (_tmp, _config, store) = open_store().await;
    let pool = store.pool();
    store
        .upsert_items(&[item("a", "1", "Keep me", 1.0, 0), item("a", "2", "Skip me", 2.0, 0)])
        .await
        .unwrap();

    let tags = vec!["later".to_string()];
    let outcome = bookmarks::add_bookmark(pool, "a-1", Some("read this"), &tags)
        .await
        .unwrap();
    assert!(matches!(outcome, BookmarkOutcome::Created { .. }));
    assert_eq!(
        bookmarks::add_bookmark(pool, "a-1", None, &[]).await.unwrap(),
        BookmarkOutcome::AlreadyBookmarked
    );
    assert_eq!(
        bookmarks::add_bookmark(pool, "missing", None, &[]).await.unwrap(),
        BookmarkOutcome::ItemNotFound
    );

    let filter = ItemFilter {
        bookmarks_only: true,
        ..Default::default()
    };
    let rows = store.query_items(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].item.id, "a-1");
    assert!(rows[0].bookmark_id.is_some());

    let update = BookmarkUpdate {
        reviewed: Some(true),
        ..Default::default()
    };
    assert!(bookmarks::update_bookmark(pool, "a-1", &update).await.unwrap());
    assert!(!bookmarks::update_bookmark(pool, "a-2", &update).await.unwrap());

    let listed = bookmarks::list_bookmarks(pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].reviewed);
    assert_eq!(listed[0].note.as_deref(), Some("read this"));
    assert_eq!(listed[0].tags, tags);
    assert_eq!(listed[0].title, "Keep me");

    assert!(bookmarks::remove_bookmark(pool, "a-1").await.unwrap());
    assert!(!bookmarks::remove_bookmark(pool, "a-1").await.unwrap());
}

#[tokio::test]
async fn test_saved_searches_history_and_suggestions() {
    let (_tmp, _config, store) = open_store().await;
    let pool = store.pool();
    store
        .upsert_items(&[
            item("a", "1", "Claude Code 1.2", 50.0, 0),
            item("a", "2", "claude desktop", 10.0, 0),
            item("a", "3", "Gemini notes", 99.0, 0),
        ])
        .await
        .unwrap();

    let id = saved_search::save_search(pool, "mine", Some("claude"), &json!({"sources": ["a"]}), Some("score"))
        .await
        .unwrap();
    assert!(saved_search::save_search(pool, "  ", None, &json!({}), None).await.is_err());

    let saved = saved_search::list_saved(pool).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].filters, json!({"sources": ["a"]}));

    saved_search::record_search(pool, "claude code").await.unwrap();
    saved_search::record_search(pool, "   ").await.unwrap();
    saved_search::record_search(pool, "mcp").await.unwrap();
    saved_search::record_search(pool, "claude code").await.unwrap();

    let recent = saved_search::recent_searches(pool).await.unwrap();
    assert_eq!(recent.len(), 2);

    let suggestions = saved_search::suggestions(pool, "CLA").await.unwrap();
    assert_eq!(suggestions[0], "claude code");
    assert!(suggestions.contains(&"Claude Code 1.2".to_string()));
    assert!(suggestions.contains(&"claude desktop".to_string()));
    assert!(!suggestions.iter().any(|s| s.starts_with("Gemini")));
    assert!(saved_search::suggestions(pool, "").await.unwrap().is_empty());

    assert!(saved_search::delete_saved(pool, id).await.unwrap());
    assert!(!saved_search::delete_saved(pool, id).await.unwrap());
}

#[tokio::test]
async fn test_seed_preserves_toggle_and_stats() {
    let (_tmp, mut config, store) = open_store().await;
    let pool = store.pool();

    config.sources = vec![
        Source::new("gh", "github", "https://api.github.com"),
        Source::new("hn", "rss", "https://news.ycombinator.com/rss"),
    ];
    config.keywords = vec![trendradar::models::Keyword {
        keyword: "rust".into(),
        weight: 1.5,
    }];

    let report = sources::seed_from_config(pool, &config).await.unwrap();
    assert_eq!(report.sources, 2);
    assert_eq!(report.keywords, 1);

    assert!(sources::set_enabled(pool, "hn", false).await.unwrap());
    assert!(!sources::set_enabled(pool, "nope", false).await.unwrap());
    sources::seed_from_config(pool, &config).await.unwrap();
    let hn = sources::get_source(pool, "hn").await.unwrap().unwrap();
    assert!(!hn.enabled);

    store
        .upsert_items(&[item("gh", "1", "x", 1.0, 0), item("orphan", "1", "y", 1.0, 0)])
        .await
        .unwrap();

    let stats = collect_stats(pool).await.unwrap();
    assert_eq!(stats.total_items, 2);
    assert_eq!(stats.total_sources, 2);
    assert_eq!(stats.enabled_sources, 1);
    let orphan = stats.by_source.iter().find(|s| s.source == "orphan").unwrap();
    assert_eq!(orphan.kind, None);
    assert_eq!(orphan.item_count, 1);
}
