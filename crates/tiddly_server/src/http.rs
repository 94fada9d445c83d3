//! HTTP routes for the tiddly server.
//!
//! Every route except `/health` sits behind the trusted-header gate, which
//! runs before method dispatch. Mutating routes check the identity again
//! inside the handler.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, delete, get};
use axum::{Json, Router};
use serde::Serialize;
use tiddly_store::RecordStore;
use tower_http::trace::TraceLayer;

use crate::auth::{IdentityResolver, GUEST};
use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::error::{ServerError, ServerResult};
use crate::listing::ListingAssembler;
use crate::payload::Fields;
use crate::revision::{RevisionEngine, RECIPE};

/// Page served at `/` when no front end is configured.
pub const DEFAULT_FRONT_END: &str = include_str!("../assets/index.html");

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Revisioned reads and writes.
    pub engine: Arc<RevisionEngine>,
    /// Bulk listing.
    pub listing: Arc<ListingAssembler>,
    /// Resolves the caller from request headers.
    pub identity: Arc<dyn IdentityResolver>,
    /// Front-end page.
    pub front_end: Bytes,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Creates state over one store handle.
    pub fn new(store: Arc<dyn RecordStore>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            engine: Arc::new(RevisionEngine::new(Arc::clone(&store))),
            listing: Arc::new(ListingAssembler::new(store)),
            identity,
            front_end: Bytes::from_static(DEFAULT_FRONT_END.as_bytes()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Serves `html` at `/`.
    pub fn with_front_end(mut self, html: impl Into<Bytes>) -> Self {
        self.front_end = html.into();
        self
    }

    /// Sets the request body limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        self.identity.current_user(headers)
    }

    fn require_user(&self, headers: &HeaderMap) -> ServerResult<String> {
        self.current_user(headers).ok_or(ServerError::PermissionDenied)
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_front_end).fallback(bad_method))
        .route("/auth", any(handle_auth))
        .route("/status", get(handle_status).fallback(bad_method))
        .route(
            "/recipes/all/tiddlers.json",
            get(handle_list).fallback(bad_method),
        )
        .route(
            "/recipes/all/tiddlers/{*title}",
            get(handle_get_tiddler)
                .put(handle_put_tiddler)
                .fallback(bad_method),
        )
        .route(
            "/bags/bag/tiddlers/{*title}",
            delete(handle_delete_tiddler).fallback(bad_method),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_identity))
        .route("/health", any(handle_health))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rejects requests without a trusted identity.
async fn require_identity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.current_user(request.headers()).is_none() {
        return ServerError::PermissionDenied.into_response();
    }
    next.run(request).await
}

/// Runs blocking store work off the async workers.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

/// Handle GET /health
async fn handle_health() -> &'static str {
    "ok\n"
}

/// Handle GET /
async fn handle_front_end(State(state): State<AppState>) -> Html<Bytes> {
    Html(state.front_end.clone())
}

/// Handle /auth
async fn handle_auth(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let name = state
        .current_user(&headers)
        .unwrap_or_else(|| GUEST.to_string());
    Html(format!(
        "<html>\nYou are logged in as {}.\n\n<a href=\"/\">Main page</a>.\n",
        escape_html(&name)
    ))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    username: String,
    space: Space,
}

#[derive(Debug, Serialize)]
struct Space {
    recipe: &'static str,
}

/// Handle GET /status
async fn handle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<StatusResponse> {
    let username = state
        .current_user(&headers)
        .unwrap_or_else(|| GUEST.to_string());
    Json(StatusResponse {
        username,
        space: Space { recipe: RECIPE },
    })
}

/// Handle GET /recipes/all/tiddlers.json
async fn handle_list(State(state): State<AppState>) -> ServerResult<Response> {
    let listing = Arc::clone(&state.listing);
    let body = blocking(move || listing.assemble()).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Handle GET /recipes/all/tiddlers/{title}
async fn handle_get_tiddler(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> ServerResult<Json<Fields>> {
    let engine = Arc::clone(&state.engine);
    let fields = blocking(move || engine.get(&title)).await?;
    Ok(Json(fields))
}

/// Handle PUT /recipes/all/tiddlers/{title}
///
/// Responds with an empty body and the content's `ETag`.
async fn handle_put_tiddler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(title): Path<String>,
    body: Body,
) -> ServerResult<Response> {
    let user = state.require_user(&headers)?;
    let data = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| ServerError::UnreadableBody(e.to_string()))?;

    let engine = Arc::clone(&state.engine);
    let log_title = title.clone();
    let outcome = blocking(move || engine.put(&title, &data)).await?;
    tracing::info!(title = %log_title, revision = outcome.revision, %user, "put tiddler");

    Ok(([(header::ETAG, outcome.etag)], ()).into_response())
}

/// Handle DELETE /bags/bag/tiddlers/{title}
async fn handle_delete_tiddler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(title): Path<String>,
) -> ServerResult<StatusCode> {
    let user = state.require_user(&headers)?;

    let engine = Arc::clone(&state.engine);
    let log_title = title.clone();
    let revision = blocking(move || engine.tombstone(&title)).await?;
    tracing::info!(title = %log_title, revision, %user, "deleted tiddler");

    Ok(StatusCode::OK)
}

async fn bad_method() -> ServerError {
    ServerError::BadMethod
}

/// Unknown paths are gated like every other route, then answer 405 for
/// anything but GET and 404 otherwise.
async fn handle_not_found(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> ServerError {
    if state.current_user(&headers).is_none() {
        return ServerError::PermissionDenied;
    }
    if method != Method::GET {
        return ServerError::BadMethod;
    }
    ServerError::route_not_found()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
