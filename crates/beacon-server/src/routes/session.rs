//! Session routes.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use beacon_core::types::{CreateSessionRequest, CreateSessionResponse, EndSessionRequest, SuccessResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::{AppState, EndOutcome};

/// Create session router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/session", post(create_session).patch(end_session))
}

/// Open a session, optionally bound to a wallet
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Json<CreateSessionResponse> {
    let record = state.create_session(req.wallet_address).await;
    info!(session_id = %record.session_id, wallet = ?record.wallet_address, "Session created");
    Json(CreateSessionResponse {
        session_id: record.session_id,
    })
}

/// Mark a session ended
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<Value>)> {
    match state.end_session(&req.session_id).await {
        EndOutcome::Ended => {
            info!(session_id = %req.session_id, "Session ended");
            Ok(Json(SuccessResponse { success: true }))
        }
        EndOutcome::AlreadyEnded => Ok(Json(SuccessResponse { success: true })),
        EndOutcome::NotFound => {
            warn!(session_id = %req.session_id, "End requested for unknown session");
            Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Session not found: {}", req.session_id) })),
            ))
        }
    }
}
