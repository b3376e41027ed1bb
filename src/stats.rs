//! Database statistics overview.
//!
//! Totals for items and bookmarks, plus a per-source breakdown with the
//! last fetch time. Shared by `radar stats` and `GET /api/stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::store::sqlite::{ts_to_datetime, SqliteStore};

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub kind: Option<String>,
    pub enabled: bool,
    pub item_count: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_items: i64,
    pub total_bookmarks: i64,
    pub total_sources: i64,
    pub enabled_sources: i64,
    pub by_source: Vec<SourceStats>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<Stats> {
    let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(pool)
        .await?;
    let total_bookmarks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks")
        .fetch_one(pool)
        .await?;
    let total_sources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
        .fetch_one(pool)
        .await?;
    let enabled_sources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources WHERE enabled = 1")
        .fetch_one(pool)
        .await?;

    // Configured sources with their counts, plus orphaned item sources
    let rows = sqlx::query(
        r#"
        SELECT s.id AS source, s.kind, s.enabled, s.last_fetched_at,
               (SELECT COUNT(*) FROM items i WHERE i.source = s.id) AS item_count
        FROM sources s
        UNION ALL
        SELECT i.source, NULL, 0, NULL, COUNT(*)
        FROM items i
        WHERE i.source NOT IN (SELECT id FROM sources)
        GROUP BY i.source
        ORDER BY item_count DESC, source ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_source = rows
        .iter()
        .map(|row| {
            let enabled: i64 = row.get("enabled");
            let last: Option<i64> = row.get("last_fetched_at");
            SourceStats {
                source: row.get("source"),
                kind: row.get("kind"),
                enabled: enabled != 0,
                item_count: row.get("item_count"),
                last_fetched_at: last.map(ts_to_datetime),
            }
        })
        .collect();

    Ok(Stats {
        total_items,
        total_bookmarks,
        total_sources,
        enabled_sources,
        by_source,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let stats = collect_stats(store.pool()).await?;
    store.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("TrendRadar: Database Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Items:       {}", stats.total_items);
    println!("  Bookmarks:   {}", stats.total_bookmarks);
    println!(
        "  Sources:     {} ({} enabled)",
        stats.total_sources, stats.enabled_sources
    );

    if !stats.by_source.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<24} {:<12} {:>8}   {}",
            "SOURCE", "KIND", "ITEMS", "LAST FETCH"
        );
        println!("  {}", "-".repeat(64));

        for s in &stats.by_source {
            let fetch_display = match s.last_fetched_at {
                Some(ts) => format_ts_relative(ts.timestamp()),
                None => "never".to_string(),
            };
            let kind = match (&s.kind, s.enabled) {
                (Some(k), true) => k.clone(),
                (Some(k), false) => format!("{} (off)", k),
                (None, _) => "-".to_string(),
            };
            println!(
                "  {:<24} {:<12} {:>8}   {}",
                s.source, kind, s.item_count, fetch_display
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
pub fn format_ts_relative(ts: i64) -> String {
    let now = Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
