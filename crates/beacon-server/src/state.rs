//! Application state.

use beacon_core::types::{SessionRecord, TrackingEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::Config;

/// Outcome of ending a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    Ended,
    AlreadyEnded,
    NotFound,
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Sessions in creation order
    pub sessions: RwLock<Vec<SessionRecord>>,
    /// Recorded tracking events, newest last
    pub events: RwLock<Vec<TrackingEvent>>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            sessions: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    /// Open a new session and return its record.
    pub async fn create_session(&self, wallet_address: Option<String>) -> SessionRecord {
        let record = SessionRecord {
            session_id: uuid::Uuid::new_v4().to_string(),
            wallet_address,
            active: true,
            created_at: Utc::now().timestamp_millis(),
            ended_at: None,
        };
        self.sessions.write().await.push(record.clone());
        record
    }

    pub async fn end_session(&self, session_id: &str) -> EndOutcome {
        let mut sessions = self.sessions.write().await;
        let Some(record) = sessions.iter_mut().find(|s| s.session_id == session_id) else {
            return EndOutcome::NotFound;
        };
        if !record.active {
            return EndOutcome::AlreadyEnded;
        }
        record.active = false;
        record.ended_at = Some(Utc::now().timestamp_millis());
        EndOutcome::Ended
    }

    /// Record an event, dropping the oldest once the configured cap is hit.
    /// The newest event is always kept, even with a cap of zero.
    pub async fn record_event(&self, event: TrackingEvent) {
        let cap = self.config.max_events.max(1);
        let mut events = self.events.write().await;
        let excess = (events.len() + 1).saturating_sub(cap);
        if excess > 0 {
            events.drain(..excess);
        }
        events.push(event);
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.iter().filter(|s| s.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::types::EventKind;
    use serde_json::json;

    fn event(n: u64) -> TrackingEvent {
        TrackingEvent {
            kind: EventKind::Custom,
            payload: json!({ "type": "n", "n": n }),
            session_id: None,
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let state = AppState::new(Config::default());

        let record = state.create_session(Some("Wa11et1".into())).await;
        assert!(record.active);
        assert_eq!(state.active_sessions().await, 1);

        assert_eq!(state.end_session(&record.session_id).await, EndOutcome::Ended);
        assert_eq!(state.end_session(&record.session_id).await, EndOutcome::AlreadyEnded);
        assert_eq!(state.end_session("missing").await, EndOutcome::NotFound);
        assert_eq!(state.active_sessions().await, 0);
        assert!(state.sessions.read().await[0].ended_at.is_some());
    }

    #[tokio::test]
    async fn test_event_cap_drops_oldest() {
        let state = AppState::new(Config {
            max_events: 3,
            ..Config::default()
        });

        for n in 0..5 {
            state.record_event(event(n)).await;
        }

        let events = state.events.read().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payload["n"], 2);
        assert_eq!(events[2].payload["n"], 4);
    }

    #[tokio::test]
    async fn test_zero_event_cap_keeps_newest() {
        let state = AppState::new(Config {
            max_events: 0,
            ..Config::default()
        });

        state.record_event(event(1)).await;
        state.record_event(event(2)).await;

        let events = state.events.read().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["n"], 2);
    }
}
