//! Code hosting adapter: repository search by topic.
//!
//! Queries `/search/repositories?q=topic:{topic}&sort=stars` once per
//! configured topic, in sequence, pausing between requests. A failing topic
//! is logged and skipped. Repositories that show up under several topics
//! are kept once.
//!
//! ```toml
//! [[sources]]
//! id = "github-trending"
//! kind = "github"
//! [sources.config]
//! topics = ["llm", "rust"]
//! # api_base = "https://api.github.com"
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

use crate::http::HttpContext;
use crate::models::{Item, RawItem, Source};
use crate::normalize::normalize;
use crate::traits::SourceAdapter;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_TOPICS: [&str; 4] = ["ai", "llm", "claude", "anthropic"];
const PER_PAGE: &str = "20";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    id: u64,
    full_name: String,
    html_url: String,
    description: Option<String>,
    owner: Option<Owner>,
    #[serde(default)]
    stargazers_count: i64,
    #[serde(default)]
    forks_count: i64,
    #[serde(default)]
    open_issues_count: i64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    created_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

pub struct GitHubAdapter {
    source: Source,
    http: HttpContext,
}

impl GitHubAdapter {
    pub fn new(source: Source, http: HttpContext) -> Self {
        Self { source, http }
    }

    fn api_base(&self) -> &str {
        self.source
            .config_str("api_base")
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    fn topics(&self) -> Vec<String> {
        match self.source.config_str_list("topics") {
            Some(topics) if !topics.is_empty() => topics,
            _ => DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn search_topic(&self, topic: &str) -> Result<Vec<Repository>> {
        let url = format!("{}/search/repositories", self.api_base());
        let query = format!("topic:{}", topic);
        let request = self
            .http
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", PER_PAGE),
            ])
            .header("Accept", "application/vnd.github.v3+json");
        let response: SearchResponse = self.http.send_json(request).await?;
        Ok(response.items)
    }
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        let topics = self.topics();
        let now = Utc::now();
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for (i, topic) in topics.iter().enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            match self.search_topic(topic).await {
                Ok(repos) => {
                    tracing::debug!(source = %self.source.id, topic = %topic, count = repos.len(), "topic searched");
                    for repo in repos {
                        if seen.insert(repo.id) {
                            items.push(normalize(repo_to_raw(repo, now), &self.source.id));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(source = %self.source.id, topic = %topic, error = %e, "topic search failed");
                }
            }
        }

        Ok(items)
    }
}

fn repo_to_raw(repo: Repository, now: DateTime<Utc>) -> RawItem {
    let score = repo_score(repo.stargazers_count, repo.forks_count, repo.pushed_at, now);
    RawItem {
        id: Some(repo.id.to_string()),
        title: Some(repo.full_name),
        url: Some(repo.html_url),
        description: repo.description,
        author: repo.owner.map(|o| o.login),
        stars: Some(repo.stargazers_count),
        score: Some(score),
        published_at: repo.pushed_at.or(repo.created_at),
        metadata: Some(json!({
            "language": repo.language,
            "forks": repo.forks_count,
            "topics": repo.topics,
            "open_issues": repo.open_issues_count,
        })),
    }
}

/// `(stars + forks * 2) * multiplier`, rounded.
pub fn repo_score(
    stars: i64,
    forks: i64,
    pushed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let base = stars as f64 + forks as f64 * 2.0;
    (base * recency_multiplier(pushed_at, now)).round()
}

/// Step function of days since the last push.
///
/// | Days since push | Multiplier |
/// |-----------------|------------|
/// | < 1 | 1.5 |
/// | < 7 | 1.2 |
/// | < 30 | 1.0 |
/// | older | 0.8 |
/// | unknown | 0.5 |
pub fn recency_multiplier(pushed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(pushed_at) = pushed_at else {
        return 0.5;
    };
    let days = (now - pushed_at).num_seconds() as f64 / 86_400.0;
    if days < 1.0 {
        1.5
    } else if days < 7.0 {
        1.2
    } else if days < 30.0 {
        1.0
    } else {
        0.8
    }
}
