//! Tracking ingestion route.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use beacon_core::types::{SuccessResponse, TrackingEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::state::AppState;

/// Create tracking router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/track", post(track))
}

/// Record one tracking event
pub async fn track(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TrackingEvent>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<Value>)> {
    if !event.payload.is_object() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "payload must be a JSON object" })),
        ));
    }

    debug!(kind = %event.kind, session_id = ?event.session_id, "Event recorded");
    state.record_event(event).await;
    Ok(Json(SuccessResponse { success: true }))
}
