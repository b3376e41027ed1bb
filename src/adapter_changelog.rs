//! Changelog adapter for product release notes.
//!
//! Two modes, chosen by `config.mode`:
//!
//! - `releases` (default): `source.url` is a release-listing JSON endpoint
//!   (GitHub releases shape). One item per release.
//! - `docs`: `source.url` is a raw `CHANGELOG.md`. The document is split on
//!   `## ` headings; each heading carrying a `x.y.z` version becomes one
//!   item, with an optional `YYYY-MM-DD` date taken from the heading.
//!
//! `config.max_items` caps the number of releases/sections (default 30).
//! Scores are recency-only: <1 day → 200, <7 → 150, <30 → 100, <90 → 70,
//! otherwise (or undated) 50.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::http::HttpContext;
use crate::models::{Item, RawItem, Source};
use crate::normalize::{normalize, strip_markdown, truncate_chars, MAX_DESCRIPTION_CHARS};
use crate::traits::SourceAdapter;

const DEFAULT_MAX_ITEMS: u64 = 30;
const MAX_LISTED_CHANGES: usize = 10;
const DOCS_URL: &str = "https://github.com/anthropics/claude-code/blob/main/CHANGELOG.md";

static SECTION_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^## ").expect("valid regex"));
static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[?(\d+\.\d+\.\d+)\]?").expect("valid regex"));
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*]\s+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Releases,
    Docs,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: Option<u64>,
    tag_name: Option<String>,
    name: Option<String>,
    html_url: Option<String>,
    body: Option<String>,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    prerelease: bool,
}

pub struct ChangelogAdapter {
    source: Source,
    http: HttpContext,
}

impl ChangelogAdapter {
    pub fn new(source: Source, http: HttpContext) -> Self {
        Self { source, http }
    }

    fn mode(&self) -> Option<Mode> {
        match self.source.config_str("mode").unwrap_or("releases") {
            "releases" => Some(Mode::Releases),
            "docs" => Some(Mode::Docs),
            _ => None,
        }
    }

    fn max_items(&self) -> usize {
        self.source
            .config_u64("max_items")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_ITEMS) as usize
    }

    async fn fetch_releases(&self) -> Result<Vec<Item>> {
        let max_items = self.max_items().to_string();
        let request = self
            .http
            .get(&self.source.url)
            .query(&[("per_page", max_items.as_str())])
            .header("Accept", "application/vnd.github.v3+json");
        let releases: Vec<Release> = self.http.send_json(request).await?;
        let now = Utc::now();
        Ok(releases
            .into_iter()
            .take(self.max_items())
            .map(|r| normalize(release_to_raw(r, now), &self.source.id))
            .collect())
    }

    async fn fetch_docs(&self) -> Result<Vec<Item>> {
        let markdown = self.http.send_text(self.http.get(&self.source.url)).await?;
        Ok(parse_changelog(&markdown, self.max_items(), Utc::now())
            .into_iter()
            .map(|raw| normalize(raw, &self.source.id))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for ChangelogAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        let result = match self.mode() {
            Some(Mode::Releases) => self.fetch_releases().await,
            Some(Mode::Docs) => self.fetch_docs().await,
            None => {
                tracing::warn!(
                    source = %self.source.id,
                    mode = ?self.source.config_str("mode"),
                    "unknown changelog mode"
                );
                return Ok(Vec::new());
            }
        };
        match result {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(source = %self.source.id, error = %e, "changelog fetch failed");
                Ok(Vec::new())
            }
        }
    }
}

fn release_to_raw(release: Release, now: DateTime<Utc>) -> RawItem {
    let body = release.body.unwrap_or_default();
    let changes = parse_changes(&body);
    let tag = release.tag_name.unwrap_or_default();
    let label = if tag.is_empty() {
        release.name.clone().unwrap_or_default()
    } else {
        tag.clone()
    };
    let local_id = if tag.is_empty() {
        release.id.map(|id| id.to_string())
    } else {
        Some(tag.clone())
    };

    RawItem {
        id: local_id,
        title: Some(format!("Claude Code {}", label)),
        url: release.html_url,
        description: Some(truncate_chars(&strip_markdown(&body), MAX_DESCRIPTION_CHARS)),
        author: Some("anthropic".to_string()),
        stars: None,
        score: Some(recency_score(release.published_at, now)),
        published_at: release.published_at,
        metadata: Some(json!({
            "version": tag.strip_prefix('v').unwrap_or(&tag),
            "type": "release",
            "change_count": changes.len(),
            "changes": changes.iter().take(MAX_LISTED_CHANGES).collect::<Vec<_>>(),
            "prerelease": release.prerelease,
        })),
    }
}

/// Split a `CHANGELOG.md` into one raw item per versioned `## ` section.
///
/// Sections whose heading has no `x.y.z` version are skipped. At most
/// `max_items` sections are considered, counting skipped ones.
pub fn parse_changelog(markdown: &str, max_items: usize, now: DateTime<Utc>) -> Vec<RawItem> {
    let mut items = Vec::new();

    for section in SECTION_HEADING.split(markdown).skip(1).take(max_items) {
        let (heading, rest) = section.split_once('\n').unwrap_or((section, ""));
        let Some(version) = VERSION.captures(heading).map(|c| c[1].to_string()) else {
            continue;
        };
        let published_at = DATE
            .captures(heading)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
        let changes = parse_changes(rest);

        items.push(RawItem {
            id: Some(format!("changelog-{}", version)),
            title: Some(format!("Claude Code Changelog: v{}", version)),
            url: Some(DOCS_URL.to_string()),
            description: Some(truncate_chars(&strip_markdown(rest), MAX_DESCRIPTION_CHARS)),
            author: Some("anthropic".to_string()),
            stars: None,
            score: Some(recency_score(published_at, now)),
            published_at,
            metadata: Some(json!({
                "version": version,
                "type": "changelog",
                "change_count": changes.len(),
                "changes": changes.iter().take(MAX_LISTED_CHANGES).collect::<Vec<_>>(),
            })),
        });
    }

    items
}

/// Bullet lines (`-` or `*`) with the marker removed; blanks dropped.
pub fn parse_changes(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .filter(|line| BULLET.is_match(line))
        .map(|line| BULLET.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn recency_score(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return 50.0;
    };
    let days = (now - published).num_seconds() as f64 / 86_400.0;
    if days < 1.0 {
        200.0
    } else if days < 7.0 {
        150.0
    } else if days < 30.0 {
        100.0
    } else if days < 90.0 {
        70.0
    } else {
        50.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const CHANGELOG: &str = "# Changelog

## 1.2.0 (2025-06-01)

- Added **bold** feature
- Fixed `code` bug
  * nested bullet

## Unreleased notes

- ignored

## [1.1.0]

Some prose.
* Only change
";

    #[test]
    fn test_parse_changelog_sections() {
        let now = Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap();
        let items = parse_changelog(CHANGELOG, 30, now);
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.id.as_deref(), Some("changelog-1.2.0"));
        assert_eq!(first.title.as_deref(), Some("Claude Code Changelog: v1.2.0"));
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(first.score, Some(150.0));
        let meta = first.metadata.as_ref().unwrap();
        assert_eq!(meta["change_count"], 3);
        assert_eq!(meta["changes"][0], "Added **bold** feature");
        assert_eq!(
            first.description.as_deref(),
            Some("- Added bold feature - Fixed code bug   * nested bullet")
        );

        let second = &items[1];
        assert_eq!(second.id.as_deref(), Some("changelog-1.1.0"));
        assert_eq!(second.published_at, None);
        assert_eq!(second.score, Some(50.0));
    }

    #[test]
    fn test_parse_changelog_respects_max_items() {
        let items = parse_changelog(CHANGELOG, 2, Utc::now());
        // The unversioned section still counts toward the cap.
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_parse_changes() {
        let body = "Intro\n- one\n*   two\n-\n  - three\nnot-a-bullet";
        assert_eq!(parse_changes(body), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_recency_buckets() {
        let now = Utc::now();
        assert_eq!(recency_score(Some(now - Duration::hours(3)), now), 200.0);
        assert_eq!(recency_score(Some(now - Duration::days(3)), now), 150.0);
        assert_eq!(recency_score(Some(now - Duration::days(20)), now), 100.0);
        assert_eq!(recency_score(Some(now - Duration::days(60)), now), 70.0);
        assert_eq!(recency_score(Some(now - Duration::days(400)), now), 50.0);
        assert_eq!(recency_score(None, now), 50.0);
    }

    #[test]
    fn test_release_mapping() {
        let release: Release = serde_json::from_value(json!({
            "id": 99,
            "tag_name": "v2.0.1",
            "html_url": "https://github.com/acme/tool/releases/tag/v2.0.1",
            "body": "## Changes\n- Faster startup\n- [Docs](https://x) updated",
            "published_at": "2025-06-01T00:00:00Z",
            "prerelease": true
        }))
        .unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let item = normalize(release_to_raw(release, now), "cc");
        assert_eq!(item.id, "cc-v2.0.1");
        assert_eq!(item.title, "Claude Code v2.0.1");
        assert_eq!(item.score, 200.0);
        assert_eq!(item.metadata["version"], "2.0.1");
        assert_eq!(item.metadata["change_count"], 2);
        assert_eq!(item.metadata["prerelease"], true);
        assert_eq!(item.description, "Changes - Faster startup - Docs updated");
    }
}
