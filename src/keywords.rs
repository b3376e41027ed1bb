//! Relevance keyword management.
//!
//! Keywords are unique by text; adding an existing keyword updates its
//! weight.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::models::Keyword;
use crate::store::sqlite::SqliteStore;

pub async fn list_keywords(pool: &SqlitePool) -> Result<Vec<Keyword>> {
    let rows = sqlx::query("SELECT keyword, weight FROM keywords ORDER BY weight DESC, keyword ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| Keyword {
            keyword: row.get("keyword"),
            weight: row.get("weight"),
        })
        .collect())
}

/// Insert a keyword or update the weight of an existing one.
pub async fn upsert_keyword(pool: &SqlitePool, keyword: &str, weight: f64) -> Result<()> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        bail!("Keyword must not be empty");
    }
    if !weight.is_finite() {
        bail!("Keyword weight must be a finite number");
    }
    sqlx::query(
        r#"
        INSERT INTO keywords (keyword, weight) VALUES (?, ?)
        ON CONFLICT(keyword) DO UPDATE SET weight = excluded.weight
        "#,
    )
    .bind(keyword)
    .bind(weight)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns `false` when no such keyword existed.
pub async fn remove_keyword(pool: &SqlitePool, keyword: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM keywords WHERE keyword = ?")
        .bind(keyword.trim())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let keywords = list_keywords(store.pool()).await?;
    store.close().await;

    if keywords.is_empty() {
        println!("No keywords.");
        return Ok(());
    }
    println!("{:<32} {:>8}", "KEYWORD", "WEIGHT");
    for k in &keywords {
        println!("{:<32} {:>8.2}", k.keyword, k.weight);
    }
    Ok(())
}

pub async fn run_add(config: &Config, keyword: &str, weight: f64) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    upsert_keyword(store.pool(), keyword, weight).await?;
    store.close().await;
    println!("keyword '{}' weight {:.2}", keyword.trim(), weight);
    Ok(())
}

pub async fn run_remove(config: &Config, keyword: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let removed = remove_keyword(store.pool(), keyword).await?;
    store.close().await;
    if !removed {
        bail!("No keyword '{}'", keyword);
    }
    println!("removed keyword '{}'", keyword.trim());
    Ok(())
}
