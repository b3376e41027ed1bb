//! Source records: seeding from config, listing, and toggling.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::keywords;
use crate::models::Source;
use crate::stats::format_ts_relative;
use crate::store::sqlite::{source_from_row, SqliteStore};

const SOURCE_COLUMNS: &str =
    "id, name, kind, url, rate_limit_minutes, enabled, last_fetched_at, config_json";

/// All sources, enabled or not, ordered by id.
pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<Source>> {
    let rows = sqlx::query(&format!("SELECT {} FROM sources ORDER BY id ASC", SOURCE_COLUMNS))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(source_from_row).collect())
}

pub async fn get_source(pool: &SqlitePool, id: &str) -> Result<Option<Source>> {
    let row = sqlx::query(&format!("SELECT {} FROM sources WHERE id = ?", SOURCE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(source_from_row))
}

/// Set the enabled flag. Returns `false` when the source does not exist.
pub async fn set_enabled(pool: &SqlitePool, id: &str, enabled: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE sources SET enabled = ? WHERE id = ?")
        .bind(enabled as i64)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert or refresh one source definition.
///
/// An existing row keeps its `enabled` toggle and `last_fetched_at`.
pub async fn upsert_source(pool: &SqlitePool, source: &Source) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sources (id, name, kind, url, rate_limit_minutes, enabled, last_fetched_at, config_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            kind = excluded.kind,
            url = excluded.url,
            rate_limit_minutes = excluded.rate_limit_minutes,
            config_json = excluded.config_json
        "#,
    )
    .bind(&source.id)
    .bind(if source.name.is_empty() { &source.id } else { &source.name })
    .bind(&source.kind)
    .bind(&source.url)
    .bind(source.rate_limit_minutes)
    .bind(source.enabled as i64)
    .bind(source.last_fetched_at.map(|t| t.timestamp()))
    .bind(source.config.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Counts of records written by [`seed_from_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub sources: usize,
    pub keywords: usize,
}

/// Write the configured `[[sources]]` and `[[keywords]]` into the database.
pub async fn seed_from_config(pool: &SqlitePool, config: &Config) -> Result<SeedReport> {
    for source in &config.sources {
        upsert_source(pool, source).await?;
    }
    for keyword in &config.keywords {
        keywords::upsert_keyword(pool, &keyword.keyword, keyword.weight).await?;
    }
    Ok(SeedReport {
        sources: config.sources.len(),
        keywords: config.keywords.len(),
    })
}

/// `radar init`: create the schema and seed sources and keywords.
pub async fn run_init(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let report = seed_from_config(store.pool(), config).await?;
    store.close().await;

    println!("init");
    println!("  database: {}", config.db.path.display());
    println!("  sources: {}", report.sources);
    println!("  keywords: {}", report.keywords);
    println!("ok");
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let sources = list_sources(store.pool()).await?;
    store.close().await;

    if sources.is_empty() {
        println!("No sources. Add [[sources]] to the config and run `radar init`.");
        return Ok(());
    }

    println!(
        "{:<24} {:<12} {:<8} {:>6}   {}",
        "SOURCE", "KIND", "ENABLED", "RATE", "LAST FETCH"
    );
    for s in &sources {
        let last = match s.last_fetched_at {
            Some(ts) => format_ts_relative(ts.timestamp()),
            None => "never".to_string(),
        };
        println!(
            "{:<24} {:<12} {:<8} {:>5}m   {}",
            s.id, s.kind, s.enabled, s.rate_limit_minutes, last
        );
    }
    Ok(())
}

pub async fn run_set_enabled(config: &Config, id: &str, enabled: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let found = set_enabled(store.pool(), id, enabled).await?;
    store.close().await;

    if !found {
        bail!("Unknown source: '{}'", id);
    }
    println!(
        "source '{}' {}",
        id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
