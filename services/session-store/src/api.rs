use crate::config::ApiConfig;
use crate::ingest::{self, IngestError};
use crate::record::{FlatRecord, TelemetryRecord};
use crate::session_store::{HealthStatus, SessionStore, SessionSummary, StoreError, StoreStats};
use crate::transcoder;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    /// Answer listing/stats failures with an empty, annotated result
    pub degrade_on_error: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Upload result
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub records_added: u64,
    pub total_sessions: i64,
}

/// Query parameters for the session list
#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Session list response
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub items: Vec<SessionSummary>,
    pub total: i64,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All flat records of one session
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub session_id: String,
    pub records: Vec<FlatRecord>,
}

/// Health response for a reachable backend
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    #[serde(flatten)]
    pub health: HealthStatus,
}

/// Stats response, annotated when degraded
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ingest_error(e: IngestError) -> ApiError {
    warn!(error = %e, "Rejected upload");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.code().to_string(),
        }),
    )
}

fn store_error(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |e| {
        error!(error = %e, "{}", context);
        let status = if e.is_unavailable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(ErrorResponse {
                error: format!("{context}: {e}"),
                code: "STORE_ERROR".to_string(),
            }),
        )
    }
}

fn degraded_message(e: &StoreError) -> String {
    format!("Database connection issue: {e}")
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(liveness))
        .route("/upload", post(upload_file))
        .route("/api/health", get(health_check))
        .route("/api/sessions", get(list_sessions).post(upload_json))
        .route("/api/sessions/:session_id", get(get_session))
        .route("/api/sessions/:session_id/download", get(download_session))
        .route("/api/stats", get(get_stats))
        .route("/api/clear", delete(clear_data))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness endpoint, no database access
async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "service": "session-store"
    }))
}

/// Flatten and store a parsed upload
async fn store_batch(state: &AppState, body: &[u8]) -> Result<Json<UploadResponse>, ApiError> {
    let records = ingest::parse_batch(body).map_err(ingest_error)?;
    let flat: Vec<FlatRecord> = records.iter().map(transcoder::flatten).collect();

    let records_added = state
        .store
        .insert_batch(&flat)
        .await
        .map_err(store_error("Error processing upload"))?;

    let total_sessions = state
        .store
        .count_sessions()
        .await
        .map_err(store_error("Error counting sessions"))?;

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded {records_added} records"),
        records_added,
        total_sessions,
    }))
}

/// Multipart upload of a `.json` file in the `file` field
#[instrument(skip(state, multipart))]
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ingest_error(IngestError::Upload(e.to_string())))?
    {
        if field.name() != Some("file") {
            continue;
        }

        ingest::check_file_name(field.file_name()).map_err(ingest_error)?;

        let body = field
            .bytes()
            .await
            .map_err(|e| ingest_error(IngestError::Upload(e.to_string())))?;

        return store_batch(&state, &body).await;
    }

    Err(ingest_error(IngestError::MissingFile))
}

/// Raw JSON array upload
#[instrument(skip(state, body), fields(bytes = body.len()))]
async fn upload_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    store_batch(&state, &body).await
}

/// List sessions with summary information
#[instrument(skip(state))]
async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionListQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    match state.store.list_sessions(params.limit, params.offset).await {
        Ok(page) => {
            let message = (page.total == 0).then(|| "No sessions found in database".to_string());
            Ok(Json(SessionListResponse {
                items: page.items,
                total: page.total,
                has_more: page.has_more,
                message,
                error: None,
            }))
        }
        Err(e) if state.degrade_on_error => {
            error!(error = %e, "Failed to list sessions, returning empty result");
            Ok(Json(SessionListResponse {
                items: Vec::new(),
                total: 0,
                has_more: false,
                message: None,
                error: Some(degraded_message(&e)),
            }))
        }
        Err(e) => Err(store_error("Failed to list sessions")(e)),
    }
}

/// All records of a session, flat
#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let records = state
        .store
        .get_session(&session_id)
        .await
        .map_err(store_error("Failed to get session"))?;

    Ok(Json(SessionDetailResponse {
        session_id,
        records,
    }))
}

/// `Content-Disposition` for an exported session
fn attachment_header(session_id: &str) -> HeaderValue {
    let safe: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=session_{safe}.json"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Export a session in its nested form
#[instrument(skip(state))]
async fn download_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let records: Vec<TelemetryRecord> = state
        .store
        .get_session_nested(&session_id)
        .await
        .map_err(store_error("Failed to export session"))?;

    Ok((
        [(header::CONTENT_DISPOSITION, attachment_header(&session_id))],
        Json(records),
    ))
}

/// Aggregate statistics
#[instrument(skip(state))]
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    match state.store.stats().await {
        Ok(stats) => Ok(Json(StatsResponse { stats, error: None })),
        Err(e) if state.degrade_on_error => {
            error!(error = %e, "Failed to compute stats, returning empty result");
            Ok(Json(StatsResponse {
                stats: StoreStats::default(),
                error: Some(degraded_message(&e)),
            }))
        }
        Err(e) => Err(store_error("Failed to compute stats")(e)),
    }
}

/// Database health endpoint
async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(health) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "connected",
                health,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string()
            })),
        )
            .into_response(),
    }
}

/// Delete every stored record
#[instrument(skip(state))]
async fn clear_data(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .store
        .clear_all()
        .await
        .map_err(store_error("Failed to clear data"))?;

    Ok(Json(serde_json::json!({
        "message": "All data cleared",
        "deleted": deleted
    })))
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting session API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
