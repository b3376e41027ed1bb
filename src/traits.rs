//! Source adapter contract and the kind-tag registry.
//!
//! Every upstream kind (web feed, code hosting search, model hub, MCP
//! registry, changelog) implements [`SourceAdapter`]. The
//! [`AdapterRegistry`] maps a source's `kind` tag to a factory, so the
//! orchestrator never needs to know the concrete adapter types.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 AdapterRegistry                  │
//! │  rss │ github │ huggingface │ mcp │ changelog │… │
//! └──────────────────────┬───────────────────────────┘
//!                        ▼
//!        run_fetch_cycle() → upsert → ItemStore
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use trendradar::config::HttpConfig;
//! use trendradar::http::HttpContext;
//! use trendradar::models::Source;
//! use trendradar::traits::AdapterRegistry;
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = AdapterRegistry::with_builtins(HttpContext::from_config(&HttpConfig::default())?);
//! let source = Source::new("hn", "rss", "https://news.ycombinator.com/rss");
//! assert!(registry.create(&source).is_some());
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter_changelog::ChangelogAdapter;
use crate::adapter_feed::FeedAdapter;
use crate::adapter_github::GitHubAdapter;
use crate::adapter_hub::HubAdapter;
use crate::adapter_mcp::McpRegistryAdapter;
use crate::http::HttpContext;
use crate::models::{Item, Source};

// ═══════════════════════════════════════════════════════════════════════
// Adapter Trait
// ═══════════════════════════════════════════════════════════════════════

/// A pluggable upstream that produces normalized items.
///
/// # Failure semantics
///
/// Expected upstream failures (non-2xx status, transport errors, malformed
/// payloads) are logged inside the adapter and yield an empty or partial
/// result. `fetch` returns `Err` only for logic errors; the orchestrator
/// records those against the single affected source.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use trendradar::models::{Item, Source};
/// use trendradar::traits::SourceAdapter;
///
/// pub struct StaticAdapter {
///     source: Source,
/// }
///
/// #[async_trait]
/// impl SourceAdapter for StaticAdapter {
///     fn source(&self) -> &Source { &self.source }
///
///     async fn fetch(&self) -> Result<Vec<Item>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source record this adapter was built from.
    fn source(&self) -> &Source;

    /// Whether enough time has passed since `last_fetched_at`.
    ///
    /// Always `true` for a source that has never been fetched.
    fn can_fetch(&self, last_fetched_at: Option<DateTime<Utc>>) -> bool {
        can_fetch_at(self.source().rate_limit_minutes, last_fetched_at, Utc::now())
    }

    /// Fetch from upstream and return normalized items.
    async fn fetch(&self) -> Result<Vec<Item>>;
}

/// Rate-limit check against an explicit clock.
///
/// A window too large to represent never elapses.
pub fn can_fetch_at(
    rate_limit_minutes: i64,
    last_fetched_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last_fetched_at {
        None => true,
        Some(last) => match Duration::try_minutes(rate_limit_minutes) {
            Some(window) => now - last >= window,
            None => false,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Builds an adapter for a source of one kind.
pub type AdapterFactory =
    Arc<dyn Fn(&Source, &HttpContext) -> Box<dyn SourceAdapter> + Send + Sync>;

/// Kind tag → adapter factory.
///
/// Use [`AdapterRegistry::with_builtins`] for the standard kinds, then
/// optionally call [`register`](AdapterRegistry::register) to add or
/// override one.
pub struct AdapterRegistry {
    http: HttpContext,
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new(http: HttpContext) -> Self {
        Self {
            http,
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry pre-loaded with every built-in adapter kind.
    pub fn with_builtins(http: HttpContext) -> Self {
        let mut registry = Self::new(http);
        registry.register("rss", |source, http| {
            Box::new(FeedAdapter::new(source.clone(), http.clone()))
        });
        registry.register("github", |source, http| {
            Box::new(GitHubAdapter::new(source.clone(), http.clone()))
        });
        registry.register("huggingface", |source, http| {
            Box::new(HubAdapter::new(source.clone(), http.clone()))
        });
        registry.register("mcp", |source, http| {
            Box::new(McpRegistryAdapter::new(source.clone(), http.clone()))
        });
        registry.register("changelog", |source, http| {
            Box::new(ChangelogAdapter::new(source.clone(), http.clone()))
        });
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&Source, &HttpContext) -> Box<dyn SourceAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Arc::new(factory));
    }

    /// Build the adapter for `source`, or `None` for an unknown kind.
    pub fn create(&self, source: &Source) -> Option<Box<dyn SourceAdapter>> {
        match self.factories.get(&source.kind) {
            Some(factory) => Some(factory(source, &self.http)),
            None => {
                tracing::warn!(source = %source.id, kind = %source.kind, "unknown source kind");
                None
            }
        }
    }

    /// Registered kind tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

/// Resolve a source to a built-in adapter; `None` for unknown kinds.
pub fn create_source_module(source: &Source, http: &HttpContext) -> Option<Box<dyn SourceAdapter>> {
    AdapterRegistry::with_builtins(http.clone()).create(source)
}
