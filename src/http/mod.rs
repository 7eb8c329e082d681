//! HTTP API.
//!
//! Endpoints:
//! - `POST /log-event`: record a usage event
//! - `POST /log-user`: register a user profile
//! - `GET /get_event_logs?event=<action>[&month=YYYY-MM]`: records for one action in one month
//! - `GET /get_all_event_logs[?event=<action>]`: records across every month
//! - `GET /health`: liveness

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::engine::CoreError;
use crate::ledger::Ledger;
use crate::model::{EventRecord, UsageEvent, UserProfile};

/// Shared state for axum handlers.
type AppState = Arc<Ledger>;

/// Bind to the configured address and serve until `shutdown` resolves.
pub async fn serve(
    ledger: Arc<Ledger>,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(ledger);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    let addr = listener.local_addr()?;
    info!(address = %addr, "HTTP API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Build the axum router (separated for testing).
pub fn router(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route("/log-event", post(log_event))
        .route("/log-user", post(log_user))
        .route("/get_event_logs", get(get_event_logs))
        .route("/get_all_event_logs", get(get_all_event_logs))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn log_event(
    State(ledger): State<AppState>,
    payload: Result<Json<UsageEvent>, JsonRejection>,
) -> Result<Json<LogEventResponse>, ApiError> {
    let Json(event) = payload?;
    let record = ledger.record_event(event).await?;
    Ok(Json(LogEventResponse {
        message: "Event logged successfully",
        event: record,
    }))
}

async fn log_user(
    State(ledger): State<AppState>,
    payload: Result<Json<UserProfile>, JsonRejection>,
) -> Result<Json<LogUserResponse>, ApiError> {
    let Json(profile) = payload?;
    let user = ledger.users().register(profile).await?;
    Ok(Json(LogUserResponse {
        message: "User logged successfully",
        user,
    }))
}

async fn get_event_logs(
    State(ledger): State<AppState>,
    Query(params): Query<EventLogsQuery>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let action = params
        .event
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'event' query parameter".to_string()))?;

    let records = ledger
        .queries()
        .query_by_action_in_period(params.month.as_deref(), &action)
        .await?;
    Ok(Json(records))
}

async fn get_all_event_logs(
    State(ledger): State<AppState>,
    Query(params): Query<AllEventLogsQuery>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let action = params.event.filter(|e| !e.is_empty());
    let records = ledger
        .queries()
        .query_across_all_partitions(action.as_deref())
        .await?;
    Ok(Json(records))
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Deserialize)]
struct EventLogsQuery {
    event: Option<String>,
    month: Option<String>,
}

#[derive(Deserialize)]
struct AllEventLogsQuery {
    event: Option<String>,
}

#[derive(Serialize)]
struct LogEventResponse {
    message: &'static str,
    event: EventRecord,
}

#[derive(Serialize)]
struct LogUserResponse {
    message: &'static str,
    user: UserProfile,
}

// ============================================================================
// Errors
// ============================================================================

/// Handler failure, rendered as `{"error": ...}` (400) or `{"detail": ...}` (500).
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "Rejected request");
            ApiError::BadRequest(err.to_string())
        } else {
            error!(error = %err, "Backend call failed");
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": detail })),
            )
                .into_response(),
        }
    }
}
