//! Inspection routes for recorded events and sessions.

use axum::{extract::State, routing::get, Json, Router};
use beacon_core::types::{SessionRecord, TrackingEvent};
use std::sync::Arc;

use crate::state::AppState;

/// Create inspection router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events))
        .route("/sessions", get(list_sessions))
}

/// Recorded events, newest last
pub async fn list_events(State(state): State<Arc<AppState>>) -> Json<Vec<TrackingEvent>> {
    Json(state.events.read().await.clone())
}

/// All sessions with their active flag
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionRecord>> {
    Json(state.sessions.read().await.clone())
}
