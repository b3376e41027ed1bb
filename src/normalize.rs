//! Raw record → canonical [`Item`] mapping.
//!
//! Adapters hand [`RawItem`]s to [`normalize`], which applies field
//! defaults and derives the item id. Ids are `{source_id}-{local_id}`;
//! when a record has no local id, a rolling hash of title + url stands in
//! so repeated fetches of the same content land on the same row.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{Item, RawItem};

/// Maximum description length kept from upstream text, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Map a raw record onto the canonical item shape.
pub fn normalize(raw: RawItem, source_id: &str) -> Item {
    let title = non_empty(raw.title);
    let url = non_empty(raw.url);

    let local_id = match non_empty(raw.id) {
        Some(id) => id,
        None => generate_id(
            title.as_deref().unwrap_or_default(),
            url.as_deref().unwrap_or_default(),
        ),
    };

    Item {
        id: format!("{}-{}", source_id, local_id),
        source: source_id.to_string(),
        title: title.unwrap_or_else(|| "Untitled".to_string()),
        url: url.unwrap_or_default(),
        description: non_empty(raw.description).unwrap_or_default(),
        author: non_empty(raw.author),
        stars: raw.stars.unwrap_or(0),
        score: raw.score.filter(|s| s.is_finite()).unwrap_or(0.0),
        published_at: raw.published_at.unwrap_or_else(Utc::now),
        metadata: match raw.metadata {
            Some(v @ Value::Object(_)) => v,
            _ => Value::Object(Default::default()),
        },
    }
}

/// Deterministic base-36 id from `title + url`.
///
/// 32-bit rolling hash (`h = h * 31 + unit` over UTF-16 code units,
/// wrapping), rendered as the base-36 absolute value.
pub fn generate_id(title: &str, url: &str) -> String {
    let mut hash: i32 = 0;
    for unit in title.encode_utf16().chain(url.encode_utf16()) {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    to_base36((hash as i64).unsigned_abs())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Remove HTML tags and cap the result at [`MAX_DESCRIPTION_CHARS`].
pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, "");
    truncate_chars(text.trim(), MAX_DESCRIPTION_CHARS)
}

static MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s+").expect("valid regex"));
static MD_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static MD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"));
static MD_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
static MD_PARAGRAPHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// Flatten markdown to a single line of plain text.
pub fn strip_markdown(md: &str) -> String {
    let text = MD_HEADING.replace_all(md, "");
    let text = MD_BOLD.replace_all(&text, "$1");
    let text = MD_ITALIC.replace_all(&text, "$1");
    let text = MD_CODE.replace_all(&text, "$1");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = MD_PARAGRAPHS.replace_all(&text, " ");
    text.replace('\n', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(title: &str, url: &str) -> RawItem {
        RawItem {
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = normalize(raw("T", "U"), "src");
        let b = normalize(raw("T", "U"), "src");
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("src-"));
    }

    #[test]
    fn test_id_changes_with_content() {
        let base = normalize(raw("T", "U"), "src");
        assert_ne!(base.id, normalize(raw("T2", "U"), "src").id);
        assert_ne!(base.id, normalize(raw("T", "U2"), "src").id);
    }

    #[test]
    fn test_generate_id_known_values() {
        // "TU" = 84 * 31 + 85
        assert_eq!(generate_id("T", "U"), to_base36(84 * 31 + 85));
        assert_eq!(generate_id("", ""), "0");
        assert_eq!(generate_id("a", ""), "2p");
    }

    #[test]
    fn test_generate_id_handles_overflow() {
        let long = "x".repeat(1000);
        let id = generate_id(&long, "https://example.com");
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_explicit_id_wins() {
        let item = normalize(
            RawItem {
                id: Some("42".to_string()),
                title: Some("T".to_string()),
                ..Default::default()
            },
            "gh",
        );
        assert_eq!(item.id, "gh-42");
    }

    #[test]
    fn test_defaults() {
        let before = Utc::now();
        let item = normalize(RawItem::default(), "src");
        assert_eq!(item.title, "Untitled");
        assert_eq!(item.url, "");
        assert_eq!(item.description, "");
        assert_eq!(item.author, None);
        assert_eq!(item.stars, 0);
        assert_eq!(item.score, 0.0);
        assert!(item.published_at >= before);
        assert_eq!(item.metadata, json!({}));
        assert_eq!(item.source, "src");
    }

    #[test]
    fn test_empty_strings_fall_back() {
        let item = normalize(
            RawItem {
                id: Some(String::new()),
                title: Some(String::new()),
                author: Some(String::new()),
                ..Default::default()
            },
            "src",
        );
        assert_eq!(item.title, "Untitled");
        assert_eq!(item.author, None);
        assert_eq!(item.id, format!("src-{}", generate_id("", "")));
    }

    #[test]
    fn test_fields_carried_through() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let item = normalize(
            RawItem {
                id: Some("x".to_string()),
                title: Some("Title".to_string()),
                url: Some("https://a".to_string()),
                description: Some("desc".to_string()),
                author: Some("me".to_string()),
                stars: Some(7),
                score: Some(12.5),
                published_at: Some(ts),
                metadata: Some(json!({"k": 1})),
            },
            "s",
        );
        assert_eq!(item.stars, 7);
        assert_eq!(item.score, 12.5);
        assert_eq!(item.published_at, ts);
        assert_eq!(item.metadata, json!({"k": 1}));
        assert_eq!(item.author.as_deref(), Some("me"));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_html(&"a".repeat(600)).chars().count(), 500);
    }

    #[test]
    fn test_strip_markdown() {
        let md = "## Title\n\n- **bold** and *it* with `code`\n- [link](http://x)";
        assert_eq!(strip_markdown(md), "Title - bold and it with code - link");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
