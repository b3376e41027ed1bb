//! Bookmarks on stored items.
//!
//! One bookmark per item (`item_id` is UNIQUE). A second add is reported as
//! [`BookmarkOutcome::AlreadyBookmarked`], not as an error.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::models::Bookmark;
use crate::store::sqlite::{ts_to_datetime, SqliteStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookmarkOutcome {
    Created { id: i64 },
    AlreadyBookmarked,
    /// No stored item with that id.
    ItemNotFound,
}

/// Fields to change on an existing bookmark; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct BookmarkUpdate {
    pub note: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reviewed: Option<bool>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_foreign_key_violation())
}

pub async fn add_bookmark(
    pool: &SqlitePool,
    item_id: &str,
    note: Option<&str>,
    tags: &[String],
) -> Result<BookmarkOutcome> {
    let result = sqlx::query(
        "INSERT INTO bookmarks (item_id, note, tags_json, reviewed, created_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(item_id)
    .bind(note)
    .bind(serde_json::to_string(tags)?)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(BookmarkOutcome::Created {
            id: done.last_insert_rowid(),
        }),
        Err(e) if is_unique_violation(&e) => Ok(BookmarkOutcome::AlreadyBookmarked),
        Err(e) if is_foreign_key_violation(&e) => Ok(BookmarkOutcome::ItemNotFound),
        Err(e) => Err(e.into()),
    }
}

/// Returns `false` when the item has no bookmark.
pub async fn update_bookmark(
    pool: &SqlitePool,
    item_id: &str,
    update: &BookmarkUpdate,
) -> Result<bool> {
    let tags_json = match update.tags {
        Some(ref tags) => Some(serde_json::to_string(tags)?),
        None => None,
    };
    let result = sqlx::query(
        r#"
        UPDATE bookmarks SET
            note = COALESCE(?, note),
            tags_json = COALESCE(?, tags_json),
            reviewed = COALESCE(?, reviewed)
        WHERE item_id = ?
        "#,
    )
    .bind(update.note.as_deref())
    .bind(tags_json)
    .bind(update.reviewed.map(|r| r as i64))
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns `false` when the item had no bookmark.
pub async fn remove_bookmark(pool: &SqlitePool, item_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM bookmarks WHERE item_id = ?")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn bookmark_from_row(row: &SqliteRow) -> Bookmark {
    let tags_json: String = row.get("tags_json");
    let reviewed: i64 = row.get("reviewed");
    Bookmark {
        id: row.get("id"),
        item_id: row.get("item_id"),
        note: row.get("note"),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        reviewed: reviewed != 0,
        created_at: ts_to_datetime(row.get("created_at")),
        title: row.get("title"),
        url: row.get("url"),
        source: row.get("source"),
    }
}

/// All bookmarks joined with their item, newest first.
pub async fn list_bookmarks(pool: &SqlitePool) -> Result<Vec<Bookmark>> {
    let rows = sqlx::query(
        r#"
        SELECT b.id, b.item_id, b.note, b.tags_json, b.reviewed, b.created_at,
               i.title, i.url, i.source
        FROM bookmarks b
        JOIN items i ON i.id = b.item_id
        ORDER BY b.created_at DESC, b.id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(bookmark_from_row).collect())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let bookmarks = list_bookmarks(store.pool()).await?;
    store.close().await;

    if bookmarks.is_empty() {
        println!("No bookmarks.");
        return Ok(());
    }
    for b in &bookmarks {
        let mark = if b.reviewed { "x" } else { " " };
        println!("[{}] {} / {}", mark, b.source, b.title);
        if !b.url.is_empty() {
            println!("    url: {}", b.url);
        }
        if let Some(ref note) = b.note {
            println!("    note: {}", note);
        }
        if !b.tags.is_empty() {
            println!("    tags: {}", b.tags.join(", "));
        }
        println!("    id: {}", b.item_id);
        println!();
    }
    Ok(())
}

pub async fn run_add(
    config: &Config,
    item_id: &str,
    note: Option<&str>,
    tags: &[String],
) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let outcome = add_bookmark(store.pool(), item_id, note, tags).await?;
    store.close().await;

    match outcome {
        BookmarkOutcome::Created { id } => println!("bookmarked {} (#{})", item_id, id),
        BookmarkOutcome::AlreadyBookmarked => println!("already bookmarked: {}", item_id),
        BookmarkOutcome::ItemNotFound => bail!("No item with id '{}'", item_id),
    }
    Ok(())
}

pub async fn run_update(config: &Config, item_id: &str, update: BookmarkUpdate) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let found = update_bookmark(store.pool(), item_id, &update).await?;
    store.close().await;
    if !found {
        bail!("No bookmark for item '{}'", item_id);
    }
    println!("updated bookmark {}", item_id);
    Ok(())
}

pub async fn run_remove(config: &Config, item_id: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let found = remove_bookmark(store.pool(), item_id).await?;
    store.close().await;
    if !found {
        bail!("No bookmark for item '{}'", item_id);
    }
    println!("removed bookmark {}", item_id);
    Ok(())
}
