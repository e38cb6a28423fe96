//! PKOS HTTP REST API
//!
//! Each endpoint has a thin axum handler that parses the request and
//! delegates to an `*_inner` function returning `(StatusCode, Value)`, so
//! the behaviour can be tested without going through the router.
//!
//! Endpoints:
//! - GET    /, /health, /version
//! - POST   /notes              create
//! - GET    /notes              list (`?include_archived=&tag=`)
//! - GET    /notes/search       semantic search (`?q=&limit=`)
//! - GET    /notes/:id          fetch
//! - PUT    /notes/:id          partial update
//! - DELETE /notes/:id          delete
//! - POST   /notes/:id/process  synchronous AI enrichment
//! - GET    /notes/:id/related  link suggestions
//! - GET    /notes/:id/history  audit history
//! - POST   /notes/:source/link/:target, DELETE same path
//! - GET    /notes/:id/links    linked notes
//! - POST   /notes/:id/auto-link
//! - GET    /audit/recent

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pkos_core::{NewNote, NoteFilter, NoteUpdate};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;
use crate::subsystems::linker::LinkOutcome;
use crate::subsystems::{audit, enrich, linker, notes};

type HttpResult = (StatusCode, serde_json::Value);

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.http.cors_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/notes", post(create_handler).get(list_handler))
        .route("/notes/", post(create_handler).get(list_handler))
        .route("/notes/search", get(search_handler))
        .route("/notes/search/", get(search_handler))
        .route(
            "/notes/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/notes/:id/process", post(process_handler))
        .route("/notes/:id/related", get(related_handler))
        .route("/notes/:id/history", get(history_handler))
        .route(
            "/notes/:id/link/:target",
            post(link_handler).delete(unlink_handler),
        )
        .route("/notes/:id/links", get(links_handler))
        .route("/notes/:id/auto-link", post(auto_link_handler))
        .route("/audit/recent", get(recent_audit_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let mut parsed = Vec::new();
    for origin in origins {
        if origin == "*" {
            tracing::warn!("Wildcard CORS origin ignored; list origins explicitly");
            continue;
        }
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(e) => tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin"),
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("PKOS HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    #[serde(default)]
    pub include_archived: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// Standard error body: `{"error": ..., "status": "error"}`.
fn error(status: StatusCode, msg: impl Into<String>) -> HttpResult {
    (
        status,
        serde_json::json!({
            "error": msg.into(),
            "status": "error",
        }),
    )
}

fn internal(e: anyhow::Error) -> HttpResult {
    tracing::error!(error = %e, "Request failed");
    error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn not_found() -> HttpResult {
    error(StatusCode::NOT_FOUND, "Note not found")
}

fn ok<T: Serialize>(value: T) -> HttpResult {
    match serde_json::to_value(value) {
        Ok(v) => (StatusCode::OK, v),
        Err(e) => internal(e.into()),
    }
}

fn message(msg: &str) -> HttpResult {
    (StatusCode::OK, serde_json::json!({ "message": msg }))
}

/// Malformed or ill-typed JSON body.
fn bad_body(rejection: JsonRejection) -> HttpResult {
    error(StatusCode::BAD_REQUEST, rejection.body_text())
}

/// Parse a path segment as a UUID, or produce the 400 response.
pub fn parse_id(raw: &str) -> std::result::Result<Uuid, HttpResult> {
    Uuid::parse_str(raw)
        .map_err(|_| error(StatusCode::BAD_REQUEST, format!("Invalid note id: {raw}")))
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn root_inner() -> serde_json::Value {
    serde_json::json!({ "message": "Welcome to Personal Knowledge OS API" })
}

pub fn health_inner(state: &AppState) -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.name(),
        "queue": state.queue.name(),
        "embedder": state.embedder.as_ref().map(|e| e.name().to_string()),
        "llm": state.llm.as_ref().map(|l| l.name().to_string()),
    })
}

/// Version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "api": "pkos/1",
    })
}

pub async fn create_inner(state: &AppState, new: NewNote) -> HttpResult {
    match notes::create_note(state, new).await {
        Ok(note) => ok(note),
        Err(e) => internal(e),
    }
}

pub async fn list_inner(state: &AppState, params: ListParams) -> HttpResult {
    let filter = NoteFilter {
        include_archived: params.include_archived,
        tag: params.tag.filter(|t| !t.is_empty()),
    };
    match notes::list_notes(state, &filter).await {
        Ok(list) => ok(list),
        Err(e) => internal(e),
    }
}

pub async fn search_inner(state: &AppState, params: SearchParams) -> HttpResult {
    let query = match params.q {
        Some(q) if !q.trim().is_empty() => q,
        _ => return error(StatusCode::BAD_REQUEST, "q parameter is required"),
    };
    let limit = notes::clamp_search_limit(params.limit);

    match notes::search_notes(state, &query, limit).await {
        Ok(list) => ok(list),
        Err(e) => internal(e),
    }
}

pub async fn get_inner(state: &AppState, id: Uuid) -> HttpResult {
    match notes::get_note(state, id).await {
        Ok(Some(note)) => ok(note),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

pub async fn update_inner(state: &AppState, id: Uuid, update: NoteUpdate) -> HttpResult {
    match notes::update_note(state, id, &update).await {
        Ok(Some(note)) => ok(note),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

pub async fn delete_inner(state: &AppState, id: Uuid) -> HttpResult {
    match notes::delete_note(state, id).await {
        Ok(true) => message("Note deleted successfully"),
        Ok(false) => not_found(),
        Err(e) => internal(e),
    }
}

pub async fn process_inner(state: &AppState, id: Uuid) -> HttpResult {
    match enrich::process_note(state, id).await {
        Ok(Some(note)) => ok(note),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

pub async fn related_inner(state: &AppState, id: Uuid) -> HttpResult {
    match enrich::suggest_links(state, id).await {
        Ok(Some(list)) => ok(list),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

pub async fn history_inner(state: &AppState, id: Uuid, limit: Option<i64>) -> HttpResult {
    match notes::get_note(state, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(e) => return internal(e),
    }
    let limit = limit.unwrap_or(audit::DEFAULT_HISTORY_LIMIT);
    ok(audit::note_history(state.store.as_ref(), id, limit).await)
}

pub async fn recent_audit_inner(state: &AppState, limit: Option<i64>) -> HttpResult {
    let limit = limit.unwrap_or(audit::DEFAULT_RECENT_LIMIT);
    ok(audit::recent_changes(state.store.as_ref(), limit).await)
}

pub async fn link_inner(state: &AppState, source: Uuid, target: Uuid) -> HttpResult {
    match linker::create_link(state, source, target).await {
        Ok(LinkOutcome::SourceMissing) => error(StatusCode::NOT_FOUND, "Source note not found"),
        Ok(LinkOutcome::TargetMissing) => error(StatusCode::NOT_FOUND, "Target note not found"),
        Ok(_) => message("Link created successfully"),
        Err(e) => internal(e),
    }
}

pub async fn unlink_inner(state: &AppState, source: Uuid, target: Uuid) -> HttpResult {
    match linker::remove_link(state, source, target).await {
        Ok(LinkOutcome::SourceMissing) => error(StatusCode::NOT_FOUND, "Source note not found"),
        Ok(_) => message("Link removed successfully"),
        Err(e) => internal(e),
    }
}

pub async fn links_inner(state: &AppState, id: Uuid) -> HttpResult {
    match notes::get_note(state, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(e) => return internal(e),
    }
    match linker::linked_notes(state, id).await {
        Ok(list) => ok(list),
        Err(e) => internal(e),
    }
}

pub async fn auto_link_inner(state: &AppState, id: Uuid) -> HttpResult {
    match linker::auto_link(state, id).await {
        Ok(Some(list)) => ok(list),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

fn respond((status, body): HttpResult) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(body))
}

pub async fn root_handler() -> impl IntoResponse {
    respond((StatusCode::OK, root_inner()))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond((StatusCode::OK, health_inner(&state)))
}

pub async fn version_handler() -> impl IntoResponse {
    respond((StatusCode::OK, version_inner()))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<NewNote>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(new)) => respond(create_inner(&state, new).await),
        Err(rejection) => respond(bad_body(rejection)),
    }
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    respond(list_inner(&state, params).await)
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    respond(search_inner(&state, params).await)
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(get_inner(&state, id).await),
        Err(bad) => respond(bad),
    }
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: std::result::Result<Json<NoteUpdate>, JsonRejection>,
) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(bad) => return respond(bad),
    };
    match body {
        Ok(Json(update)) => respond(update_inner(&state, id, update).await),
        Err(rejection) => respond(bad_body(rejection)),
    }
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(delete_inner(&state, id).await),
        Err(bad) => respond(bad),
    }
}

pub async fn process_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(process_inner(&state, id).await),
        Err(bad) => respond(bad),
    }
}

pub async fn related_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(related_inner(&state, id).await),
        Err(bad) => respond(bad),
    }
}

pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(history_inner(&state, id, params.limit).await),
        Err(bad) => respond(bad),
    }
}

pub async fn recent_audit_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    respond(recent_audit_inner(&state, params.limit).await)
}

pub async fn link_handler(
    State(state): State<Arc<AppState>>,
    Path((source, target)): Path<(String, String)>,
) -> impl IntoResponse {
    match (parse_id(&source), parse_id(&target)) {
        (Ok(source), Ok(target)) => respond(link_inner(&state, source, target).await),
        (Err(bad), _) | (_, Err(bad)) => respond(bad),
    }
}

pub async fn unlink_handler(
    State(state): State<Arc<AppState>>,
    Path((source, target)): Path<(String, String)>,
) -> impl IntoResponse {
    match (parse_id(&source), parse_id(&target)) {
        (Ok(source), Ok(target)) => respond(unlink_inner(&state, source, target).await),
        (Err(bad), _) | (_, Err(bad)) => respond(bad),
    }
}

pub async fn links_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(links_inner(&state, id).await),
        Err(bad) => respond(bad),
    }
}

pub async fn auto_link_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => respond(auto_link_inner(&state, id).await),
        Err(bad) => respond(bad),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["api"], "pkos/1");
    }

    #[test]
    fn test_root_inner_message() {
        assert_eq!(root_inner()["message"], "Welcome to Personal Knowledge OS API");
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let (status, body) = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("not-a-uuid"));
    }

    #[test]
    fn test_parse_id_accepts_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_error_body_shape() {
        let (status, body) = not_found();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "Note not found", "status": "error" }));
    }

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        // Construction must not panic on a bad header value.
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
