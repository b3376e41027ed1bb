//! Fetch cycle orchestration.
//!
//! Walks the enabled sources in id order, one at a time:
//! registry lookup → rate-limit check → adapter fetch → upsert →
//! advance `last_fetched_at`. Every source gets its own failure boundary,
//! so one broken upstream never hides the results of the others, and the
//! cycle always returns a complete [`FetchOutcome`].

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::http::HttpContext;
use crate::models::Source;
use crate::store::sqlite::SqliteStore;
use crate::store::ItemStore;
use crate::traits::{AdapterRegistry, SourceAdapter};

/// Per-source result of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Success { items: usize },
    RateLimited { items: usize },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchError {
    pub source: String,
    pub error: String,
}

/// Report returned by [`run_fetch_cycle`]. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchOutcome {
    /// Items returned by all adapters that ran.
    pub fetched: usize,
    pub sources: BTreeMap<String, SourceStatus>,
    pub errors: Vec<FetchError>,
}

impl FetchOutcome {
    fn record_error(&mut self, source: &str, error: String) {
        self.errors.push(FetchError {
            source: source.to_string(),
            error,
        });
    }
}

/// Run one fetch cycle over the enabled sources.
///
/// With `source_filter`, only the enabled source with that id is
/// considered. Returns `Err` only when the source list itself cannot be
/// loaded; per-source failures are reported inside the outcome.
pub async fn run_fetch_cycle(
    store: &dyn ItemStore,
    registry: &AdapterRegistry,
    source_filter: Option<&str>,
) -> Result<FetchOutcome> {
    let mut sources = store.enabled_sources().await?;
    if let Some(id) = source_filter {
        sources.retain(|s| s.id == id);
    }

    let mut outcome = FetchOutcome::default();

    for mut source in sources {
        let Some(adapter) = registry.create(&source) else {
            outcome.record_error(&source.id, format!("Unknown source kind: {}", source.kind));
            continue;
        };

        if !adapter.can_fetch(source.last_fetched_at) {
            tracing::info!(source = %source.id, "rate limited, skipping");
            outcome
                .sources
                .insert(source.id.clone(), SourceStatus::RateLimited { items: 0 });
            continue;
        }

        match fetch_one(store, adapter.as_ref(), &mut source).await {
            Ok(count) => {
                tracing::info!(source = %source.id, items = count, "source fetched");
                outcome.fetched += count;
                outcome
                    .sources
                    .insert(source.id.clone(), SourceStatus::Success { items: count });
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!(source = %source.id, error = %message, "source fetch failed");
                outcome.sources.insert(
                    source.id.clone(),
                    SourceStatus::Error {
                        error: message.clone(),
                    },
                );
                outcome.record_error(&source.id, message);
            }
        }
    }

    Ok(outcome)
}

/// Fetch, persist, then advance the source's fetch time.
///
/// `last_fetched_at` moves only after the items are stored, and is updated
/// both in the store and on `source`.
async fn fetch_one(
    store: &dyn ItemStore,
    adapter: &dyn SourceAdapter,
    source: &mut Source,
) -> Result<usize> {
    let items = adapter.fetch().await?;
    store.upsert_items(&items).await?;

    let now = Utc::now();
    store.mark_source_fetched(&source.id, now).await?;
    source.last_fetched_at = Some(now);

    Ok(items.len())
}

/// CLI entry point: run a cycle against the configured database and print it.
pub async fn run_fetch(config: &Config, source_filter: Option<&str>, json: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let registry = AdapterRegistry::with_builtins(HttpContext::from_config(&config.http)?);

    let outcome = run_fetch_cycle(&store, &registry, source_filter).await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.sources.is_empty() && outcome.errors.is_empty() {
        match source_filter {
            Some(id) => println!("No enabled source with id '{}'.", id),
            None => println!("No enabled sources. Add [[sources]] to the config and run `radar init`."),
        }
        return Ok(());
    }

    println!("fetch");
    for (id, status) in &outcome.sources {
        match status {
            SourceStatus::Success { items } => println!("  {:<24} ok            {} items", id, items),
            SourceStatus::RateLimited { .. } => println!("  {:<24} rate limited", id),
            SourceStatus::Error { error } => println!("  {:<24} error         {}", id, error),
        }
    }
    for err in outcome
        .errors
        .iter()
        .filter(|e| !outcome.sources.contains_key(&e.source))
    {
        println!("  {:<24} error         {}", err.source, err.error);
    }
    println!("  fetched: {} items", outcome.fetched);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::{Item, RawItem};
    use crate::normalize::normalize;
    use crate::store::memory::InMemoryStore;
    use crate::store::ItemFilter;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;

    /// Emits `config.count` items, or fails when `config.fail` is set.
    struct ScriptedAdapter {
        source: Source,
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn source(&self) -> &Source {
            &self.source
        }

        async fn fetch(&self) -> Result<Vec<Item>> {
            if self.source.config.get("fail").is_some() {
                anyhow::bail!("scripted failure");
            }
            let count = self.source.config_u64("count").unwrap_or(0);
            Ok((0..count)
                .map(|i| {
                    normalize(
                        RawItem {
                            id: Some(i.to_string()),
                            title: Some(format!("{} item {}", self.source.id, i)),
                            score: Some(10.0),
                            ..Default::default()
                        },
                        &self.source.id,
                    )
                })
                .collect())
        }
    }

    fn registry() -> AdapterRegistry {
        let http = HttpContext::from_config(&HttpConfig::default()).unwrap();
        let mut registry = AdapterRegistry::new(http);
        registry.register("scripted", |source, _| {
            Box::new(ScriptedAdapter {
                source: source.clone(),
            })
        });
        registry
    }

    fn scripted(id: &str, config: serde_json::Value) -> Source {
        Source::new(id, "scripted", "").with_config(config)
    }

    #[tokio::test]
    async fn test_partial_failure_isolated() {
        let store = InMemoryStore::new();
        store.put_source(scripted("a", json!({"count": 2})));
        store.put_source(scripted("b", json!({"fail": true})));
        store.put_source(scripted("c", json!({"count": 3})));

        let outcome = run_fetch_cycle(&store, &registry(), None).await.unwrap();

        assert_eq!(outcome.fetched, 5);
        assert_eq!(outcome.sources["a"], SourceStatus::Success { items: 2 });
        assert_eq!(outcome.sources["c"], SourceStatus::Success { items: 3 });
        assert!(matches!(outcome.sources["b"], SourceStatus::Error { .. }));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].source, "b");
        assert!(outcome.errors[0].error.contains("scripted failure"));
        assert_eq!(store.count_items().await.unwrap(), 5);

        // A failed source does not advance its fetch time
        assert!(store.source("a").unwrap().last_fetched_at.is_some());
        assert!(store.source("b").unwrap().last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_source_is_skipped() {
        let store = InMemoryStore::new();
        let mut recent = scripted("recent", json!({"count": 4}));
        let last = Utc::now() - Duration::minutes(30);
        recent.last_fetched_at = Some(last);
        store.put_source(recent);

        let outcome = run_fetch_cycle(&store, &registry(), None).await.unwrap();
        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.sources["recent"], SourceStatus::RateLimited { items: 0 });
        assert!(outcome.errors.is_empty());
        assert_eq!(store.count_items().await.unwrap(), 0);
        assert_eq!(store.source("recent").unwrap().last_fetched_at, Some(last));
    }

    #[tokio::test]
    async fn test_empty_fetch_still_advances_fetch_time() {
        let store = InMemoryStore::new();
        store.put_source(scripted("empty", json!({})));

        let outcome = run_fetch_cycle(&store, &registry(), None).await.unwrap();
        assert_eq!(outcome.sources["empty"], SourceStatus::Success { items: 0 });
        assert!(store.source("empty").unwrap().last_fetched_at.is_some());

        // Second run inside the window is rate limited
        let outcome = run_fetch_cycle(&store, &registry(), None).await.unwrap();
        assert_eq!(outcome.sources["empty"], SourceStatus::RateLimited { items: 0 });
    }

    #[tokio::test]
    async fn test_unknown_kind_recorded_in_errors_only() {
        let store = InMemoryStore::new();
        store.put_source(Source::new("weird", "bogus", ""));
        store.put_source(scripted("ok", json!({"count": 1})));

        let outcome = run_fetch_cycle(&store, &registry(), None).await.unwrap();
        assert_eq!(outcome.fetched, 1);
        assert!(!outcome.sources.contains_key("weird"));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].source, "weird");
        assert!(outcome.errors[0].error.contains("bogus"));
    }

    #[tokio::test]
    async fn test_source_filter_and_disabled_sources() {
        let store = InMemoryStore::new();
        store.put_source(scripted("a", json!({"count": 1})));
        store.put_source(scripted("b", json!({"count": 1})));
        let mut off = scripted("off", json!({"count": 1}));
        off.enabled = false;
        store.put_source(off);

        let outcome = run_fetch_cycle(&store, &registry(), Some("b")).await.unwrap();
        assert_eq!(outcome.sources.keys().collect::<Vec<_>>(), vec!["b"]);

        let outcome = run_fetch_cycle(&store, &registry(), Some("off")).await.unwrap();
        assert!(outcome.sources.is_empty());

        let rows = store.query_items(&ItemFilter::default()).await.unwrap();
        assert!(rows.iter().all(|r| r.item.source == "b"));
    }

    #[test]
    fn test_outcome_serialization() {
        let mut outcome = FetchOutcome::default();
        outcome.fetched = 2;
        outcome
            .sources
            .insert("a".into(), SourceStatus::Success { items: 2 });
        outcome
            .sources
            .insert("b".into(), SourceStatus::RateLimited { items: 0 });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({
                "fetched": 2,
                "sources": {
                    "a": {"status": "success", "items": 2},
                    "b": {"status": "rate_limited", "items": 0}
                },
                "errors": []
            })
        );
    }
}
