//! Model hub adapter: trending models and spaces.
//!
//! Two listings are fetched one after the other and merged. Each listing
//! fails on its own; a broken spaces endpoint still yields models.
//!
//! - models: `score = downloads / 100 + likes * 5`, `stars = downloads`
//! - spaces: `score = likes * 10`, `stars = likes`

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::http::HttpContext;
use crate::models::{Item, RawItem, Source};
use crate::normalize::normalize;
use crate::traits::SourceAdapter;

const DEFAULT_API_BASE: &str = "https://huggingface.co";
const MODELS_LIMIT: &str = "30";
const SPACES_LIMIT: &str = "20";

#[derive(Debug, Deserialize)]
struct Model {
    id: String,
    author: Option<String>,
    #[serde(default)]
    downloads: i64,
    #[serde(default)]
    likes: i64,
    pipeline_tag: Option<String>,
    library_name: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastModified")]
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Space {
    id: String,
    author: Option<String>,
    #[serde(default)]
    likes: i64,
    sdk: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastModified")]
    last_modified: Option<DateTime<Utc>>,
}

pub struct HubAdapter {
    source: Source,
    http: HttpContext,
}

impl HubAdapter {
    pub fn new(source: Source, http: HttpContext) -> Self {
        Self { source, http }
    }

    fn api_base(&self) -> &str {
        self.source
            .config_str("api_base")
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    async fn list<T: serde::de::DeserializeOwned>(&self, listing: &str, limit: &str) -> Result<Vec<T>> {
        let url = format!("{}/api/{}", self.api_base(), listing);
        let request = self
            .http
            .get(&url)
            .query(&[("sort", "trending"), ("limit", limit)]);
        self.http.send_json(request).await
    }
}

#[async_trait]
impl SourceAdapter for HubAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();

        match self.list::<Model>("models", MODELS_LIMIT).await {
            Ok(models) => {
                items.extend(
                    models
                        .into_iter()
                        .map(|m| normalize(model_to_raw(m), &self.source.id)),
                );
            }
            Err(e) => tracing::warn!(source = %self.source.id, error = %e, "model listing failed"),
        }

        self.http.pause().await;

        match self.list::<Space>("spaces", SPACES_LIMIT).await {
            Ok(spaces) => {
                items.extend(
                    spaces
                        .into_iter()
                        .map(|s| normalize(space_to_raw(s), &self.source.id)),
                );
            }
            Err(e) => tracing::warn!(source = %self.source.id, error = %e, "space listing failed"),
        }

        Ok(items)
    }
}

pub fn model_score(downloads: i64, likes: i64) -> f64 {
    (downloads as f64 / 100.0 + likes as f64 * 5.0).round()
}

pub fn space_score(likes: i64) -> f64 {
    (likes * 10) as f64
}

fn model_to_raw(model: Model) -> RawItem {
    let description = match model.pipeline_tag.as_deref() {
        Some(tag) if !tag.is_empty() => format!("{} model", tag),
        _ => "ML Model".to_string(),
    };
    RawItem {
        id: Some(format!("model-{}", model.id)),
        title: Some(model.id.clone()),
        url: Some(format!("https://huggingface.co/{}", model.id)),
        description: Some(description),
        author: model.author,
        stars: Some(model.downloads),
        score: Some(model_score(model.downloads, model.likes)),
        published_at: model.last_modified.or(model.created_at),
        metadata: Some(json!({
            "type": "model",
            "pipeline": model.pipeline_tag,
            "library": model.library_name,
            "likes": model.likes,
        })),
    }
}

fn space_to_raw(space: Space) -> RawItem {
    let description = match space.sdk.as_deref() {
        Some(sdk) if !sdk.is_empty() => format!("{} Space", sdk),
        _ => "HuggingFace Space".to_string(),
    };
    RawItem {
        id: Some(format!("space-{}", space.id)),
        title: Some(format!("🚀 {}", space.id)),
        url: Some(format!("https://huggingface.co/spaces/{}", space.id)),
        description: Some(description),
        author: space.author,
        stars: Some(space.likes),
        score: Some(space_score(space.likes)),
        published_at: space.last_modified.or(space.created_at),
        metadata: Some(json!({
            "type": "space",
            "sdk": space.sdk,
            "likes": space.likes,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores() {
        assert_eq!(model_score(12_345, 7), 158.0);
        assert_eq!(model_score(0, 0), 0.0);
        assert_eq!(space_score(12), 120.0);
    }

    #[test]
    fn test_model_mapping() {
        let model: Model = serde_json::from_value(json!({
            "id": "org/llama-mini",
            "author": "org",
            "downloads": 5000,
            "likes": 2,
            "pipeline_tag": "text-generation",
            "library_name": "transformers",
            "lastModified": "2025-05-01T12:00:00.000Z"
        }))
        .unwrap();
        let item = normalize(model_to_raw(model), "hf");
        assert_eq!(item.id, "hf-model-org/llama-mini");
        assert_eq!(item.url, "https://huggingface.co/org/llama-mini");
        assert_eq!(item.description, "text-generation model");
        assert_eq!(item.stars, 5000);
        assert_eq!(item.score, 60.0);
        assert_eq!(item.metadata["library"], "transformers");
    }

    #[test]
    fn test_space_mapping_defaults() {
        let space: Space = serde_json::from_value(json!({"id": "someone/demo", "likes": 3})).unwrap();
        let item = normalize(space_to_raw(space), "hf");
        assert_eq!(item.id, "hf-space-someone/demo");
        assert_eq!(item.title, "🚀 someone/demo");
        assert_eq!(item.url, "https://huggingface.co/spaces/someone/demo");
        assert_eq!(item.description, "HuggingFace Space");
        assert_eq!(item.score, 30.0);
    }
}
