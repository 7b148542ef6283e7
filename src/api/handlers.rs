//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, SessionResponse};
use super::AppState;
use crate::state_machine::PartyId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions/:party_id", get(get_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let live_sessions = state
        .store
        .count_live()
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(HealthResponse {
        status: "ok",
        live_sessions,
        operator_channel_configured: state.operator_channel_configured,
    }))
}

// ============================================================
// Session Lookup
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(party_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let party_id: PartyId = party_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid party id: {party_id}")))?;

    let session = state
        .store
        .get(party_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("No live session for party {party_id}")))?;

    Ok(Json(SessionResponse { session }))
}

async fn get_version() -> &'static str {
    concat!("desk-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Admin API request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
