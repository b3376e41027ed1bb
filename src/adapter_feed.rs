//! Web feed adapter (RSS 2.0 and Atom).
//!
//! Fetches `source.url`, walks the document with a streaming
//! `quick_xml` reader, and maps each `<item>` / `<entry>` to an item.
//! Descriptions are stripped of markup; the score is recency only.
//!
//! # Configuration
//!
//! ```toml
//! [[sources]]
//! id = "hn"
//! kind = "rss"
//! url = "https://news.ycombinator.com/rss"
//! ```
//!
//! # Field mapping
//!
//! | Item field | RSS 2.0 | Atom |
//! |------------|---------|------|
//! | local id | `guid`, else `link` | `id`, else `link@href` |
//! | title | `title` | `title` |
//! | url | `link` | `link@href` (prefers `rel="alternate"`) |
//! | description | `description`, else `content:encoded` | `summary`, else `content` |
//! | author | `author`, else `dc:creator` | `author/name` |
//! | published | `pubDate` | `published`, else `updated` |

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::http::HttpContext;
use crate::models::{Item, RawItem, Source};
use crate::normalize::{normalize, strip_html};
use crate::traits::SourceAdapter;

pub struct FeedAdapter {
    source: Source,
    http: HttpContext,
}

impl FeedAdapter {
    pub fn new(source: Source, http: HttpContext) -> Self {
        Self { source, http }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        let body = match self.http.send_text(self.http.get(&self.source.url)).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(source = %self.source.id, error = %e, "feed fetch failed");
                return Ok(Vec::new());
            }
        };

        let entries = match parse_feed(&body) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(source = %self.source.id, error = %e, "feed parse failed");
                return Ok(Vec::new());
            }
        };

        let now = Utc::now();
        let items: Vec<Item> = entries
            .into_iter()
            .map(|entry| normalize(entry.into_raw(now), &self.source.id))
            .collect();
        tracing::debug!(source = %self.source.id, count = items.len(), "feed parsed");
        Ok(items)
    }
}

/// One `<item>` or `<entry>` with the raw text of each field.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    /// Set once a preferred (`alternate` or rel-less) Atom link is seen.
    link_is_alternate: bool,
}

impl FeedEntry {
    fn append(&mut self, child: &str, grandchild: Option<&str>, text: &str) {
        let slot = match (child, grandchild) {
            ("title", None) => &mut self.title,
            ("link", None) => &mut self.link,
            ("guid", None) | ("id", None) => &mut self.id,
            ("description", _) | ("summary", _) => &mut self.summary,
            ("content", _) | ("encoded", _) => &mut self.content,
            ("author", None) | ("author", Some("name")) => &mut self.author,
            ("creator", None) => &mut self.creator,
            ("pubDate", None) | ("published", None) => &mut self.published,
            ("updated", None) => &mut self.updated,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    /// Returns `false` when the element has no `href`, i.e. an RSS text link.
    fn take_atom_link(&mut self, e: &BytesStart<'_>) -> Result<bool> {
        let mut href = None;
        let mut rel = None;
        for attr in e.attributes().flatten() {
            match attr.key.local_name().as_ref() {
                b"href" => href = Some(attr.unescape_value()?.into_owned()),
                b"rel" => rel = Some(attr.unescape_value()?.into_owned()),
                _ => {}
            }
        }
        let Some(href) = href else {
            return Ok(false);
        };
        let alternate = matches!(rel.as_deref(), None | Some("alternate"));
        if self.link.is_none() || (alternate && !self.link_is_alternate) {
            self.link = Some(href);
            self.link_is_alternate = alternate;
        }
        Ok(true)
    }

    /// An RSS `<link>` element carries the item URL as text and wins over
    /// any `atom:link` seen so far.
    fn start_text_link(&mut self) {
        self.link = Some(String::new());
        self.link_is_alternate = true;
    }

    /// Trim every field, dropping the ones left empty.
    fn finish(mut self) -> Self {
        for slot in [
            &mut self.id,
            &mut self.title,
            &mut self.link,
            &mut self.summary,
            &mut self.content,
            &mut self.author,
            &mut self.creator,
            &mut self.published,
            &mut self.updated,
        ] {
            *slot = slot
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        self
    }

    /// Map onto a raw item, scoring by age relative to `now`.
    pub fn into_raw(self, now: DateTime<Utc>) -> RawItem {
        let published_at = self
            .published
            .as_deref()
            .or(self.updated.as_deref())
            .and_then(parse_feed_date);
        let description = self
            .summary
            .or(self.content)
            .map(|d| strip_html(&d));

        RawItem {
            id: self.id.or_else(|| self.link.clone()),
            title: self.title,
            url: self.link,
            description,
            author: self.author.or(self.creator),
            stars: None,
            score: Some(recency_score(published_at, now)),
            published_at,
            metadata: None,
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn is_entry(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// Parse an RSS 2.0 or Atom document into entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    // Untrimmed so whitespace between inline markup survives.
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    // Element names below the current entry, outermost first.
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if current.is_none() && is_entry(&name) {
                    current = Some(FeedEntry::default());
                    path.clear();
                    continue;
                }
                if let Some(entry) = current.as_mut() {
                    if path.is_empty() && name == "link" && !entry.take_atom_link(&e)? {
                        entry.start_text_link();
                    }
                    path.push(name);
                }
            }
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    if path.is_empty() && local_name(&e) == "link" {
                        entry.take_atom_link(&e)?;
                    }
                }
            }
            Event::Text(t) => {
                if let Some(entry) = current.as_mut() {
                    if let Some(child) = path.first() {
                        let text = t.unescape()?;
                        entry.append(child, path.get(1).map(String::as_str), &text);
                    }
                }
            }
            Event::CData(c) => {
                if let Some(entry) = current.as_mut() {
                    if let Some(child) = path.first() {
                        let bytes = c.into_inner();
                        let text = String::from_utf8_lossy(&bytes);
                        entry.append(child, path.get(1).map(String::as_str), &text);
                    }
                }
            }
            Event::End(_) => {
                if current.is_some() {
                    if path.pop().is_none() {
                        if let Some(entry) = current.take() {
                            entries.push(entry.finish());
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Parse RFC 2822 (RSS), RFC 3339 (Atom), or a bare `YYYY-MM-DD`.
pub fn parse_feed_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

/// Recency buckets by age: <6h → 20, <24h → 15, <72h → 10, else 5.
///
/// Undated entries get the lowest bucket.
pub fn recency_score(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return 5.0;
    };
    let hours = (now - published).num_seconds() as f64 / 3600.0;
    if hours < 6.0 {
        20.0
    } else if hours < 24.0 {
        15.0
    } else if hours < 72.0 {
        10.0
    } else {
        5.0
    }
}
