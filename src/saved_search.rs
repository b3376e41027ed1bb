//! Saved searches, search history, and prefix suggestions.

use anyhow::{bail, Result};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::models::SavedSearch;
use crate::store::sqlite::{ts_to_datetime, SqliteStore};

/// Maximum entries returned by [`recent_searches`] and [`suggestions`].
pub const HISTORY_LIMIT: i64 = 10;

/// Store a named search. The name must not be blank.
pub async fn save_search(
    pool: &SqlitePool,
    name: &str,
    query: Option<&str>,
    filters: &Value,
    sort_by: Option<&str>,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Saved search name is required");
    }
    let filters = match filters {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    let result = sqlx::query(
        "INSERT INTO saved_searches (name, query, filters_json, sort_by, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(query.filter(|q| !q.trim().is_empty()))
    .bind(filters.to_string())
    .bind(sort_by)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Saved searches, newest first.
pub async fn list_saved(pool: &SqlitePool) -> Result<Vec<SavedSearch>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, query, filters_json, sort_by, created_at
        FROM saved_searches
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| {
            let filters_json: String = row.get("filters_json");
            SavedSearch {
                id: row.get("id"),
                name: row.get("name"),
                query: row.get("query"),
                filters: serde_json::from_str(&filters_json)
                    .unwrap_or(Value::Object(Default::default())),
                sort_by: row.get("sort_by"),
                created_at: ts_to_datetime(row.get("created_at")),
            }
        })
        .collect())
}

/// Returns `false` when no saved search has that id.
pub async fn delete_saved(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM saved_searches WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Append a query to the search history. Blank queries are ignored.
pub async fn record_search(pool: &SqlitePool, query: &str) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(());
    }
    sqlx::query("INSERT INTO search_history (query, searched_at) VALUES (?, ?)")
        .bind(query)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(())
}

/// Most recent distinct queries, newest first.
pub async fn recent_searches(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT query FROM search_history
        GROUP BY query
        ORDER BY MAX(searched_at) DESC, MAX(id) DESC
        LIMIT ?
        "#,
    )
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Escape `%`, `_` and `\` for a `LIKE .. ESCAPE '\'` pattern.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Past queries, then item titles, that start with `prefix`.
///
/// Matching is case-insensitive (ASCII). Duplicates are dropped and the
/// result is capped at [`HISTORY_LIMIT`].
pub async fn suggestions(pool: &SqlitePool, prefix: &str) -> Result<Vec<String>> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = like_prefix(prefix);

    let history: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT query FROM search_history
        WHERE query LIKE ? ESCAPE '\'
        GROUP BY query
        ORDER BY MAX(searched_at) DESC
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?;

    let titles: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT title FROM items
        WHERE title LIKE ? ESCAPE '\'
        GROUP BY title
        ORDER BY MAX(score) DESC
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?;

    let mut out: Vec<String> = Vec::new();
    for s in history.into_iter().chain(titles) {
        if !out.iter().any(|o| o.eq_ignore_ascii_case(&s)) {
            out.push(s);
        }
    }
    out.truncate(HISTORY_LIMIT as usize);
    Ok(out)
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let saved = list_saved(store.pool()).await?;
    store.close().await;

    if saved.is_empty() {
        println!("No saved searches.");
        return Ok(());
    }
    println!("{:>4}  {:<24} {:<24} {}", "ID", "NAME", "QUERY", "SORT");
    for s in &saved {
        println!(
            "{:>4}  {:<24} {:<24} {}",
            s.id,
            s.name,
            s.query.as_deref().unwrap_or("-"),
            s.sort_by.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn run_save(
    config: &Config,
    name: &str,
    query: Option<&str>,
    filters: &Value,
    sort_by: Option<&str>,
) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let id = save_search(store.pool(), name, query, filters, sort_by).await?;
    store.close().await;
    println!("saved search '{}' (#{})", name.trim(), id);
    Ok(())
}

pub async fn run_delete(config: &Config, id: i64) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let found = delete_saved(store.pool(), id).await?;
    store.close().await;
    if !found {
        bail!("No saved search with id {}", id);
    }
    println!("deleted saved search #{}", id);
    Ok(())
}

pub async fn run_recent(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let recent = recent_searches(store.pool()).await?;
    store.close().await;

    if recent.is_empty() {
        println!("No recent searches.");
        return Ok(());
    }
    for q in &recent {
        println!("{}", q);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("rust"), "rust%");
        assert_eq!(like_prefix("50%_off\\"), "50\\%\\_off\\\\%");
    }
}
