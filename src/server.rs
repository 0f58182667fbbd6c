//! HTTP trigger server using axum.

use crate::engine::{ApprovalEngine, RunError, RunStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared state for the HTTP trigger
pub struct ServerState {
    pub engine: Arc<ApprovalEngine>,
    /// Limit applied when the request names none
    pub default_limit: Option<u64>,
}

/// Request to start an approval run
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub channel: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Run the HTTP server
pub async fn run(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    eprintln!("[server] Listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/accept", post(accept_handler))
        .with_state(state)
}

/// GET / - Service banner
async fn index_handler() -> impl IntoResponse {
    Json(json!({
        "status": "joinwarden running",
        "service": "join-request-approver",
    }))
}

/// GET /health - Liveness and run activity
async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "active_runs": state.engine.active_runs(),
    }))
}

/// POST /accept - Trigger an approval run and wait for its result
async fn accept_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AcceptRequest>,
) -> Response {
    let Some(channel) = request.channel else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing_field".to_string(),
                message: "Missing required 'channel' field".to_string(),
            }),
        )
            .into_response();
    };

    let limit = request.limit.or(state.default_limit);

    // Sender stays alive for the duration of the request; dropping the
    // connection does not cancel the run.
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    match state.engine.run(&channel, limit, None, cancel_rx).await {
        Ok(result) => {
            let code = status_code_for(result.status);
            (code, Json(result)).into_response()
        }
        Err(e @ RunError::AlreadyRunning(_)) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "already_running".to_string(),
                message: e.to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "run_failed".to_string(),
                message: e.to_string(),
            }),
        )
            .into_response(),
    }
}

fn status_code_for(status: RunStatus) -> StatusCode {
    match status {
        RunStatus::Success => StatusCode::OK,
        RunStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
