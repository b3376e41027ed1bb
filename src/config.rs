use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::{Keyword, Source};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Outbound request settings shared by every adapter.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Pause between consecutive requests issued by one adapter.
    #[serde(default = "default_request_pause_ms")]
    pub request_pause_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            request_pause_ms: default_request_pause_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "AI-Intelligence-Hub/1.0".to_string()
}
fn default_request_pause_ms() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> i64 {
    100
}
fn default_max_limit() -> i64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// A config with defaults everywhere and the database at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            http: HttpConfig::default(),
            query: QueryConfig::default(),
            server: ServerConfig::default(),
            sources: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    if config.query.default_limit < 1 {
        anyhow::bail!("query.default_limit must be >= 1");
    }
    if config.query.max_limit < config.query.default_limit {
        anyhow::bail!("query.max_limit must be >= query.default_limit");
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.id.trim().is_empty() {
            anyhow::bail!("sources: id must not be empty");
        }
        if !seen.insert(source.id.as_str()) {
            anyhow::bail!("sources: duplicate id '{}'", source.id);
        }
        if source.rate_limit_minutes < 0 {
            anyhow::bail!(
                "sources.{}: rate_limit_minutes must be >= 0",
                source.id
            );
        }
        if !source.config.is_object() {
            anyhow::bail!("sources.{}: config must be a table", source.id);
        }
    }

    for kw in &config.keywords {
        if kw.keyword.trim().is_empty() {
            anyhow::bail!("keywords: keyword must not be empty");
        }
        if !kw.weight.is_finite() {
            anyhow::bail!("keywords.{}: weight must be a finite number", kw.keyword);
        }
    }

    Ok(())
}
