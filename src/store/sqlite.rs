//! SQLite-backed [`ItemStore`] implementation.
//!
//! Items live in the `items` table keyed by id, with an `items_fts` FTS5
//! table over title + description kept in step inside the same transaction.
//! Bookmarks are joined in so every returned row carries `bookmark_id`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{Item, Keyword, Source, StoredItem};

use super::{ItemFilter, ItemStore};

/// SQLite implementation of the [`ItemStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Unix seconds → UTC timestamp (epoch on out-of-range input).
pub(crate) fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Build an FTS5 MATCH expression: every term quoted, prefix-matched, ANDed.
pub(crate) fn fts_match_expr(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn source_from_row(row: &SqliteRow) -> Source {
    let config_json: String = row.get("config_json");
    let last_fetched_at: Option<i64> = row.get("last_fetched_at");
    let enabled: i64 = row.get("enabled");
    Source {
        id: row.get("id"),
        name: row.get("name"),
        kind: row.get("kind"),
        url: row.get("url"),
        rate_limit_minutes: row.get("rate_limit_minutes"),
        enabled: enabled != 0,
        last_fetched_at: last_fetched_at.map(ts_to_datetime),
        config: serde_json::from_str(&config_json).unwrap_or(serde_json::json!({})),
    }
}

fn stored_item_from_row(row: &SqliteRow) -> StoredItem {
    let metadata_json: String = row.get("metadata_json");
    StoredItem {
        item: Item {
            id: row.get("id"),
            source: row.get("source"),
            title: row.get("title"),
            url: row.get("url"),
            description: row.get("description"),
            author: row.get("author"),
            stars: row.get("stars"),
            score: row.get("score"),
            published_at: ts_to_datetime(row.get("published_at")),
            metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        },
        bookmark_id: row.get("bookmark_id"),
        created_at: ts_to_datetime(row.get("created_at")),
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn upsert_items(&self, items: &[Item]) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut written = 0usize;
        let mut tx = self.pool.begin().await?;

        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO items (id, source, title, url, description, author, stars, score,
                                   published_at, metadata_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    title = excluded.title,
                    url = excluded.url,
                    description = excluded.description,
                    author = excluded.author,
                    stars = excluded.stars,
                    score = excluded.score,
                    published_at = excluded.published_at,
                    metadata_json = excluded.metadata_json
                "#,
            )
            .bind(&item.id)
            .bind(&item.source)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.description)
            .bind(&item.author)
            .bind(item.stars)
            .bind(item.score)
            .bind(item.published_at.timestamp())
            .bind(item.metadata.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected() as usize;

            sqlx::query("DELETE FROM items_fts WHERE item_id = ?")
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO items_fts (item_id, title, description) VALUES (?, ?, ?)")
                .bind(&item.id)
                .bind(&item.title)
                .bind(&item.description)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn query_items(&self, filter: &ItemFilter) -> Result<Vec<StoredItem>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT i.id, i.source, i.title, i.url, i.description, i.author, i.stars, i.score,
                   i.published_at, i.metadata_json, i.created_at, b.id AS bookmark_id
            FROM items i
            LEFT JOIN bookmarks b ON b.item_id = i.id
            WHERE 1 = 1
            "#,
        );

        if let Some(ref sources) = filter.sources {
            if !sources.is_empty() {
                qb.push(" AND i.source IN (");
                let mut separated = qb.separated(", ");
                for source in sources {
                    separated.push_bind(source.clone());
                }
                separated.push_unseparated(")");
            }
        }

        let terms = filter.search_terms();
        if !terms.is_empty() {
            qb.push(" AND i.id IN (SELECT item_id FROM items_fts WHERE items_fts MATCH ");
            qb.push_bind(fts_match_expr(&terms));
            qb.push(")");
        }

        if let Some(from) = filter.date_from {
            qb.push(" AND i.published_at >= ").push_bind(from.timestamp());
        }
        if let Some(to) = filter.date_to {
            qb.push(" AND i.published_at <= ").push_bind(to.timestamp());
        }
        if let Some(min) = filter.score_min {
            qb.push(" AND i.score >= ").push_bind(min);
        }
        if let Some(max) = filter.score_max {
            qb.push(" AND i.score <= ").push_bind(max);
        }
        if filter.bookmarks_only {
            qb.push(" AND b.id IS NOT NULL");
        }

        qb.push(format!(
            " ORDER BY i.{} {}, i.id ASC",
            filter.sort_by.column(),
            filter.sort_order.as_sql()
        ));
        qb.push(" LIMIT ").push_bind(filter.limit.max(0));
        qb.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(stored_item_from_row).collect())
    }

    async fn count_items(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_keywords(&self) -> Result<Vec<Keyword>> {
        let rows = sqlx::query("SELECT keyword, weight FROM keywords ORDER BY keyword ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| Keyword {
                keyword: row.get("keyword"),
                weight: row.get("weight"),
            })
            .collect())
    }

    async fn enabled_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, kind, url, rate_limit_minutes, enabled, last_fetched_at, config_json
            FROM sources
            WHERE enabled = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(source_from_row).collect())
    }

    async fn mark_source_fetched(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE sources SET last_fetched_at = MAX(COALESCE(last_fetched_at, 0), ?) WHERE id = ?",
        )
        .bind(at.timestamp())
        .bind(source_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
