//! # HTTP Surface
//!
//! JSON API, server-rendered page and health check over one [`EntryStore`].
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /api/entries` | all entries, newest first |
//! | `POST /api/entries` | add an entry |
//! | `PUT /api/entries/:id` | patch an entry |
//! | `DELETE /api/entries/:id` | remove an entry |
//! | `GET /` | HTML page with the list and an add form |
//! | `POST /entries` | form submission, redirects back to `/` |
//! | `GET /health` | liveness |
//!
//! `/api/` routes pass the origin allowlist and the rate limiter. Every
//! response carries the hardening headers from [`security`]. Store calls run
//! on the blocking pool since they do file I/O and may wait on the data file
//! lock.

pub mod rate_limit;
pub mod security;

use crate::config::Config;
use crate::entry::{Entry, EntryCandidate, EntryPatch, EntrySummary};
use crate::errors::{AppError, AppResult, EntryError, EntryResult};
use crate::render::{self, FormDraft, Notice};
use crate::store::EntryStore;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use rate_limit::RateLimiter;
use security::OriginPolicy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EntryStore>,
    pub limiter: Arc<RateLimiter>,
    pub origins: Arc<OriginPolicy>,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(store: EntryStore, config: &Config) -> Self {
        Self {
            store: Arc::new(store),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_window,
                config.rate_limit_max,
            )),
            origins: Arc::new(OriginPolicy::new(config.allowed_origins.clone())),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/entries", get(list_entries).post(create_entry))
        .route("/api/entries/:id", put(update_entry).delete(delete_entry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::check_origin,
        ));

    Router::new()
        .route("/", get(index))
        .route("/entries", post(submit_form))
        .route("/health", get(health))
        .merge(api)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(middleware::from_fn(security::apply_headers))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

/// Binds `config.bind_addr` and serves until Ctrl-C.
pub async fn serve(state: AppState, config: &Config) -> AppResult<()> {
    let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
        AppError::Server(format!("Failed to bind {}: {}", config.bind_addr, e))
    })?;
    info!(addr = %listener.local_addr()?, "Logbook server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::Server(e.to_string()))?;

    info!("Logbook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn trace_request(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %Uuid::new_v4(),
    );

    async move {
        let started = Instant::now();
        let response = next.run(request).await;
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}

/// Failures as HTTP clients see them.
///
/// Internal detail stays in the logs; the body only names the failure kind.
#[derive(Debug)]
enum ApiError {
    InvalidJson,
    Entry {
        error: EntryError,
        /// Client-facing message for server-side failures.
        context: &'static str,
    },
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidJson => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid JSON body" }),
            ),
            ApiError::Entry { error, context } => match error {
                EntryError::Validation(details) => {
                    warn!(count = details.len(), "Rejected request: validation failed");
                    (
                        StatusCode::BAD_REQUEST,
                        json!({ "error": "Validation failed", "details": details }),
                    )
                }
                EntryError::Capacity { .. } => (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "Maximum number of entries reached" }),
                ),
                EntryError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    json!({ "error": "Entry not found" }),
                ),
                EntryError::Persistence(e) => {
                    error!(error = %e, "{}", context);
                    (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": context }))
                }
            },
            ApiError::Internal(context) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": context }))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Runs a store call on the blocking pool.
async fn blocking<T, F>(context: &'static str, call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> EntryResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(ApiError::Entry { error, context }),
        Err(join_error) => {
            error!(error = %join_error, "Store task failed");
            Err(ApiError::Internal(context))
        }
    }
}

/// Parses a request body that must be a JSON object.
fn json_object(body: &[u8]) -> Result<Value, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        _ => Err(ApiError::InvalidJson),
    }
}

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, ApiError> {
    let store = Arc::clone(&state.store);
    let entries = blocking("Failed to fetch entries", move || store.list_all()).await?;
    Ok(Json(entries))
}

async fn create_entry(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let candidate: EntryCandidate =
        serde_json::from_value(json_object(&body)?).map_err(|_| ApiError::InvalidJson)?;

    let store = Arc::clone(&state.store);
    let entry = blocking("Failed to save entry", move || store.add(candidate)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Entry added successfully",
            "entry": EntrySummary::from(&entry),
        })),
    )
        .into_response())
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let patch: EntryPatch =
        serde_json::from_value(json_object(&body)?).map_err(|_| ApiError::InvalidJson)?;

    let store = Arc::clone(&state.store);
    let entry = blocking("Failed to update entry", move || store.update(&id, patch)).await?;

    Ok(Json(json!({
        "message": "Entry updated successfully",
        "entry": entry,
    })))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = Arc::clone(&state.store);
    blocking("Failed to delete entry", move || store.delete(&id)).await?;
    Ok(Json(json!({ "message": "Entry deleted successfully" })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
struct IndexQuery {
    added: Option<String>,
}

async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Response {
    let store = Arc::clone(&state.store);
    match blocking("Failed to fetch entries", move || store.list_all()).await {
        Ok(entries) => {
            let notice = query.added.map(Notice::Added);
            Html(render::index_page(&entries, notice.as_ref(), None)).into_response()
        }
        Err(e) => {
            if let ApiError::Entry { error, .. } = &e {
                error!(error = %error, "Failed to render logbook page");
            }
            let notice = Notice::Failure("Failed to fetch entries".to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render::index_page(&[], Some(&notice), None)),
            )
                .into_response()
        }
    }
}

/// Fields of the add form, all as submitted.
#[derive(Debug, Default, Deserialize)]
struct EntryForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    lat: String,
    #[serde(default)]
    lon: String,
}

enum FormOutcome {
    Added(Entry),
    Rejected(Vec<String>, Vec<Entry>),
}

async fn submit_form(State(state): State<AppState>, Form(form): Form<EntryForm>) -> Response {
    let candidate =
        EntryCandidate::from_text(&form.title, &form.body, Some(&form.lat), Some(&form.lon));

    let store = Arc::clone(&state.store);
    let outcome = blocking("Failed to save entry", move || {
        let messages = match store.add(candidate) {
            Ok(entry) => return Ok(FormOutcome::Added(entry)),
            Err(EntryError::Validation(messages)) => messages,
            Err(EntryError::Capacity { .. }) => {
                vec!["Maximum number of entries reached".to_string()]
            }
            Err(other) => return Err(other),
        };
        Ok(FormOutcome::Rejected(messages, store.list_all()?))
    })
    .await;

    match outcome {
        Ok(FormOutcome::Added(entry)) => {
            Redirect::to(&format!("/?added={}", entry.id)).into_response()
        }
        Ok(FormOutcome::Rejected(messages, entries)) => {
            warn!(count = messages.len(), "Rejected form submission");
            let draft = FormDraft {
                title: form.title,
                body: form.body,
                lat: form.lat,
                lon: form.lon,
            };
            let notice = Notice::Rejected(messages);
            (
                StatusCode::BAD_REQUEST,
                Html(render::index_page(&entries, Some(&notice), Some(&draft))),
            )
                .into_response()
        }
        Err(e) => {
            if let ApiError::Entry { error, .. } = &e {
                error!(error = %error, "Failed to save form entry");
            }
            let notice = Notice::Failure("Failed to save entry".to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render::index_page(&[], Some(&notice), None)),
            )
                .into_response()
        }
    }
}
