//! MCP server registry adapter with a built-in fallback list.
//!
//! Requests the registry listing as JSON. If the request fails, the status
//! is not 2xx, or the body is not a usable listing, the adapter returns a
//! fixed list of well-known servers with descending scores instead. The
//! result is never empty.
//!
//! The listing may be either a bare array or `{ "servers": [...] }`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::HttpContext;
use crate::models::{Item, RawItem, Source};
use crate::normalize::normalize;
use crate::traits::SourceAdapter;

const DEFAULT_REGISTRY_URL: &str = "https://glama.ai/mcp/servers";

/// Served when the registry is unreachable: (name, description).
const FALLBACK_SERVERS: [(&str, &str); 5] = [
    ("filesystem", "File system operations"),
    ("github", "GitHub API integration"),
    ("postgres", "PostgreSQL database access"),
    ("slack", "Slack workspace integration"),
    ("brave-search", "Brave Search API"),
];

#[derive(Debug, Deserialize)]
struct ServerEntry {
    id: Option<Value>,
    name: String,
    url: Option<String>,
    repository: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(default)]
    stars: i64,
    #[serde(default)]
    downloads: i64,
    updated_at: Option<String>,
    created_at: Option<String>,
    category: Option<String>,
    tools: Option<Value>,
}

pub struct McpRegistryAdapter {
    source: Source,
    http: HttpContext,
}

impl McpRegistryAdapter {
    pub fn new(source: Source, http: HttpContext) -> Self {
        Self { source, http }
    }

    fn registry_url(&self) -> &str {
        if self.source.url.is_empty() {
            DEFAULT_REGISTRY_URL
        } else {
            &self.source.url
        }
    }

    async fn fetch_listing(&self) -> Result<Vec<ServerEntry>> {
        let request = self
            .http
            .get(self.registry_url())
            .header("Accept", "application/json");
        let body: Value = self.http.send_json(request).await?;
        parse_listing(body)
    }

    /// The fixed seed list, scored 100, 90, 80, ...
    pub fn fallback_items(&self) -> Vec<Item> {
        FALLBACK_SERVERS
            .iter()
            .enumerate()
            .map(|(i, (name, desc))| {
                normalize(
                    RawItem {
                        id: Some(name.to_string()),
                        title: Some(format!("🔌 {}", name)),
                        url: Some(format!("https://github.com/anthropics/mcp-server-{}", name)),
                        description: Some(desc.to_string()),
                        score: Some(100.0 - i as f64 * 10.0),
                        metadata: Some(json!({ "type": "mcp-server", "fallback": true })),
                        ..Default::default()
                    },
                    &self.source.id,
                )
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for McpRegistryAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        match self.fetch_listing().await {
            Ok(servers) if !servers.is_empty() => Ok(servers
                .into_iter()
                .map(|s| normalize(server_to_raw(s), &self.source.id))
                .collect()),
            Ok(_) => {
                tracing::info!(source = %self.source.id, "registry listing empty, using fallback servers");
                Ok(self.fallback_items())
            }
            Err(e) => {
                tracing::warn!(source = %self.source.id, error = %e, "registry unavailable, using fallback servers");
                Ok(self.fallback_items())
            }
        }
    }
}

fn parse_listing(body: Value) -> Result<Vec<ServerEntry>> {
    let list = match body {
        Value::Object(mut map) => match map.remove("servers") {
            Some(servers) => servers,
            None => bail!("registry response has no servers list"),
        },
        other => other,
    };
    let Value::Array(entries) = list else {
        bail!("registry servers list is not an array");
    };
    Ok(entries
        .into_iter()
        .filter_map(|e| serde_json::from_value(e).ok())
        .collect())
}

fn parse_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn server_to_raw(server: ServerEntry) -> RawItem {
    let id = match server.id {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => server.name.clone(),
    };
    let url = server
        .url
        .or(server.repository)
        .unwrap_or_else(|| format!("https://glama.ai/mcp/servers/{}", server.name));
    let published_at = parse_timestamp(server.updated_at.as_deref())
        .or_else(|| parse_timestamp(server.created_at.as_deref()));

    RawItem {
        id: Some(id),
        title: Some(format!("🔌 {}", server.name)),
        url: Some(url),
        description: server.description,
        author: server.author,
        stars: Some(server.stars),
        score: Some(server.stars as f64 + server.downloads as f64 / 10.0),
        published_at,
        metadata: Some(json!({
            "type": "mcp-server",
            "category": server.category,
            "tools": server.tools,
        })),
    }
}
