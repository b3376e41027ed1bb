//! JSON HTTP API.
//!
//! Serves the query, fetch, source, bookmark, search-history, and stats
//! operations over HTTP for the dashboard.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Health check (returns version) |
//! | `GET` | `/api/items` | Filtered, ranked items |
//! | `POST` | `/api/fetch` | Run a fetch cycle (`{"sourceId": ..}` optional) |
//! | `GET` | `/api/sources` | All sources |
//! | `PUT` | `/api/sources/{id}/toggle` | `{"enabled": bool}` |
//! | `GET` / `POST` | `/api/bookmarks` | List / add |
//! | `PATCH` / `DELETE` | `/api/bookmarks/{itemId}` | Update / remove |
//! | `GET` | `/api/search/suggestions?q=` | Prefix suggestions |
//! | `GET` | `/api/search/recent` | Recent queries |
//! | `GET` / `POST` | `/api/search/saved` | List / save |
//! | `DELETE` | `/api/search/saved/{id}` | Delete a saved search |
//! | `GET` | `/api/stats` | Totals and per-source counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "name is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! Fetch cycles are serialized: a second `POST /api/fetch` waits for the
//! running one to finish.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::bookmarks::{self, BookmarkOutcome, BookmarkUpdate};
use crate::config::{Config, QueryConfig};
use crate::http::HttpContext;
use crate::ingest::{run_fetch_cycle, FetchOutcome};
use crate::saved_search;
use crate::search::{effective_limit, parse_date_bound, query_page, ItemsPage};
use crate::sources;
use crate::stats::{collect_stats, Stats};
use crate::store::sqlite::SqliteStore;
use crate::store::{ItemFilter, SortKey, SortOrder};
use crate::traits::AdapterRegistry;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteStore>,
    registry: Arc<AdapterRegistry>,
    /// Held for the duration of a fetch cycle.
    fetch_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, registry: AdapterRegistry) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            registry: Arc::new(registry),
            fetch_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open the configured database and build the built-in adapter registry.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let store = SqliteStore::open(config).await?;
        sources::seed_from_config(store.pool(), config).await?;
        let registry = AdapterRegistry::with_builtins(HttpContext::from_config(&config.http)?);
        Ok(Self::new(config.clone(), store, registry))
    }
}

/// Build the router with CORS open to all origins.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/items", get(handle_items))
        .route("/api/fetch", post(handle_fetch))
        .route("/api/sources", get(handle_sources))
        .route("/api/sources/{id}/toggle", put(handle_toggle_source))
        .route("/api/bookmarks", get(handle_list_bookmarks).post(handle_add_bookmark))
        .route(
            "/api/bookmarks/{item_id}",
            patch(handle_update_bookmark).delete(handle_remove_bookmark),
        )
        .route("/api/search/suggestions", get(handle_suggestions))
        .route("/api/search/recent", get(handle_recent))
        .route("/api/search/saved", get(handle_list_saved).post(handle_save_search))
        .route("/api/search/saved/{id}", delete(handle_delete_saved))
        .route("/api/stats", get(handle_stats))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::open(config).await?;
    let app = router(state);

    println!("TrendRadar listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

/// Parse an optional JSON body; an empty body yields `T::default()`.
fn optional_json<T: serde::de::DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid JSON body: {}", e)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/items ============

/// Query string accepted by `GET /api/items`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsParams {
    /// Comma-separated source ids.
    pub sources: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
    pub bookmarks_only: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ItemsParams {
    /// Validate and convert into a store filter.
    pub fn into_filter(self, query: &QueryConfig) -> Result<ItemFilter, AppError> {
        let sources = self.sources.map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        let date_from = match self.date_from.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_date_bound(s, false).map_err(|e| bad_request(e.to_string()))?),
            None => None,
        };
        let date_to = match self.date_to.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_date_bound(s, true).map_err(|e| bad_request(e.to_string()))?),
            None => None,
        };
        let sort_by = match self.sort_by.as_deref() {
            Some(s) => s
                .parse::<SortKey>()
                .map_err(|e| bad_request(e.to_string()))?,
            None => SortKey::default(),
        };
        let sort_order = match self.sort_order.as_deref() {
            Some(s) => s
                .parse::<SortOrder>()
                .map_err(|e| bad_request(e.to_string()))?,
            None => SortOrder::default(),
        };
        if self.offset.is_some_and(|o| o < 0) {
            return Err(bad_request("offset must be >= 0"));
        }

        Ok(ItemFilter {
            sources: sources.filter(|s| !s.is_empty()),
            search: self.search.filter(|s| !s.trim().is_empty()),
            date_from,
            date_to,
            score_min: self.score_min,
            score_max: self.score_max,
            bookmarks_only: self.bookmarks_only.unwrap_or(false),
            sort_by,
            sort_order,
            limit: effective_limit(self.limit, query),
            offset: self.offset.unwrap_or(0),
        })
    }
}

async fn handle_items(
    State(state): State<AppState>,
    Query(params): Query<ItemsParams>,
) -> Result<Json<ItemsPage>, AppError> {
    let filter = params.into_filter(&state.config.query)?;
    if let Some(ref text) = filter.search {
        saved_search::record_search(state.store.pool(), text)
            .await
            .map_err(internal)?;
    }
    let page = query_page(state.store.as_ref(), filter)
        .await
        .map_err(internal)?;
    Ok(Json(page))
}

// ============ POST /api/fetch ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest {
    source_id: Option<String>,
}

async fn handle_fetch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FetchOutcome>, AppError> {
    let request: FetchRequest = optional_json(&body)?;
    let _guard = state.fetch_lock.lock().await;
    let outcome = run_fetch_cycle(
        state.store.as_ref(),
        &state.registry,
        request.source_id.as_deref(),
    )
    .await
    .map_err(internal)?;
    Ok(Json(outcome))
}

// ============ Sources ============

async fn handle_sources(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let sources = sources::list_sources(state.store.pool())
        .await
        .map_err(internal)?;
    Ok(Json(json!({ "sources": sources })))
}

#[derive(Deserialize)]
struct ToggleRequest {
    enabled: bool,
}

async fn handle_toggle_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: ToggleRequest = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("expected {{\"enabled\": bool}}: {}", e)))?;
    let found = sources::set_enabled(state.store.pool(), &id, request.enabled)
        .await
        .map_err(internal)?;
    if !found {
        return Err(not_found(format!("source not found: {}", id)));
    }
    Ok(Json(json!({ "status": "updated", "id": id, "enabled": request.enabled })))
}

// ============ Bookmarks ============

async fn handle_list_bookmarks(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let bookmarks = bookmarks::list_bookmarks(state.store.pool())
        .await
        .map_err(internal)?;
    Ok(Json(json!({ "count": bookmarks.len(), "bookmarks": bookmarks })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBookmarkRequest {
    item_id: Option<String>,
    note: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

async fn handle_add_bookmark(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: AddBookmarkRequest = optional_json(&body)?;
    let Some(item_id) = request.item_id.filter(|id| !id.is_empty()) else {
        return Err(bad_request("itemId required"));
    };
    let outcome = bookmarks::add_bookmark(
        state.store.pool(),
        &item_id,
        request.note.as_deref(),
        &request.tags,
    )
    .await
    .map_err(internal)?;

    match outcome {
        BookmarkOutcome::Created { id } => {
            Ok(Json(json!({ "status": "added", "itemId": item_id, "id": id })))
        }
        BookmarkOutcome::AlreadyBookmarked => {
            Ok(Json(json!({ "status": "already_bookmarked", "itemId": item_id })))
        }
        BookmarkOutcome::ItemNotFound => Err(not_found(format!("item not found: {}", item_id))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct UpdateBookmarkRequest {
    note: Option<String>,
    tags: Option<Vec<String>>,
    reviewed: Option<bool>,
}

async fn handle_update_bookmark(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: UpdateBookmarkRequest = optional_json(&body)?;
    let update = BookmarkUpdate {
        note: request.note,
        tags: request.tags,
        reviewed: request.reviewed,
    };
    let found = bookmarks::update_bookmark(state.store.pool(), &item_id, &update)
        .await
        .map_err(internal)?;
    if !found {
        return Err(not_found(format!("bookmark not found: {}", item_id)));
    }
    Ok(Json(json!({ "status": "updated", "itemId": item_id })))
}

async fn handle_remove_bookmark(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let found = bookmarks::remove_bookmark(state.store.pool(), &item_id)
        .await
        .map_err(internal)?;
    if !found {
        return Err(not_found(format!("bookmark not found: {}", item_id)));
    }
    Ok(Json(json!({ "status": "removed", "itemId": item_id })))
}

// ============ Search history ============

#[derive(Debug, Deserialize)]
struct SuggestionParams {
    #[serde(default)]
    q: String,
}

async fn handle_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Value>, AppError> {
    let suggestions = saved_search::suggestions(state.store.pool(), &params.q)
        .await
        .map_err(internal)?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

async fn handle_recent(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let recent = saved_search::recent_searches(state.store.pool())
        .await
        .map_err(internal)?;
    Ok(Json(json!({ "searches": recent })))
}

async fn handle_list_saved(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let saved = saved_search::list_saved(state.store.pool())
        .await
        .map_err(internal)?;
    Ok(Json(json!({ "searches": saved })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveSearchRequest {
    #[serde(default)]
    name: String,
    query: Option<String>,
    #[serde(default)]
    filters: Value,
    sort_by: Option<String>,
}

async fn handle_save_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: SaveSearchRequest = optional_json(&body)?;
    if request.name.trim().is_empty() {
        return Err(bad_request("name is required"));
    }
    let id = saved_search::save_search(
        state.store.pool(),
        &request.name,
        request.query.as_deref(),
        &request.filters,
        request.sort_by.as_deref(),
    )
    .await
    .map_err(internal)?;
    Ok(Json(json!({ "status": "saved", "id": id })))
}

async fn handle_delete_saved(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let found = saved_search::delete_saved(state.store.pool(), id)
        .await
        .map_err(internal)?;
    if !found {
        return Err(not_found(format!("saved search not found: {}", id)));
    }
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    let stats = collect_stats(state.store.pool()).await.map_err(internal)?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_params_defaults() {
        let filter = ItemsParams::default()
            .into_filter(&QueryConfig::default())
            .unwrap();
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
        assert_eq!(filter.sort_by, SortKey::Score);
        assert_eq!(filter.sort_order, SortOrder::Desc);
        assert!(filter.sources.is_none());
        assert!(!filter.bookmarks_only);
    }

    #[test]
    fn test_items_params_conversion() {
        let params = ItemsParams {
            sources: Some("hn, gh,,".to_string()),
            search: Some("  ".to_string()),
            date_from: Some("2025-01-01".to_string()),
            sort_by: Some("publishedAt".to_string()),
            sort_order: Some("asc".to_string()),
            limit: Some(5000),
            ..Default::default()
        };
        let filter = params.into_filter(&QueryConfig::default()).unwrap();
        assert_eq!(filter.sources, Some(vec!["hn".to_string(), "gh".to_string()]));
        assert!(filter.search.is_none());
        assert!(filter.date_from.is_some());
        assert_eq!(filter.sort_by, SortKey::PublishedAt);
        assert_eq!(filter.sort_order, SortOrder::Asc);
        assert_eq!(filter.limit, 500);
    }

    #[test]
    fn test_items_params_rejects_bad_values() {
        let bad_sort = ItemsParams {
            sort_by: Some("popularity".to_string()),
            ..Default::default()
        };
        let err = bad_sort.into_filter(&QueryConfig::default()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let bad_date = ItemsParams {
            date_to: Some("tomorrow".to_string()),
            ..Default::default()
        };
        assert!(bad_date.into_filter(&QueryConfig::default()).is_err());

        let bad_offset = ItemsParams {
            offset: Some(-1),
            ..Default::default()
        };
        assert!(bad_offset.into_filter(&QueryConfig::default()).is_err());
    }

    #[test]
    fn test_optional_json() {
        let empty: FetchRequest = optional_json(&Bytes::new()).unwrap();
        assert!(empty.source_id.is_none());
        let some: FetchRequest = optional_json(&Bytes::from_static(br#"{"sourceId":"hn"}"#)).unwrap();
        assert_eq!(some.source_id.as_deref(), Some("hn"));
        assert!(optional_json::<FetchRequest>(&Bytes::from_static(b"{nope")).is_err());
    }
}
