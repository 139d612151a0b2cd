//! Shared types for beacon-core.
//!
//! These types are used by both the API client and the development server.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Tracking Events
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a tracking event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    WalletConnect,
    WalletDisconnect,
    CourseStart,
    CourseComplete,
    Custom,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::PageView => write!(f, "page_view"),
            EventKind::WalletConnect => write!(f, "wallet_connect"),
            EventKind::WalletDisconnect => write!(f, "wallet_disconnect"),
            EventKind::CourseStart => write!(f, "course_start"),
            EventKind::CourseComplete => write!(f, "course_complete"),
            EventKind::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page_view" => Ok(EventKind::PageView),
            "wallet_connect" => Ok(EventKind::WalletConnect),
            "wallet_disconnect" => Ok(EventKind::WalletDisconnect),
            "course_start" => Ok(EventKind::CourseStart),
            "course_complete" => Ok(EventKind::CourseComplete),
            "custom" => Ok(EventKind::Custom),
            other => Err(format!("unknown event kind: {}", other)),
        }
    }
}

/// A single tracking event as sent to `POST /track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Normalized outcome of a tracking call. Never an error to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

/// Response of `POST /session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Body of `PATCH /session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_id: String,
}

/// Generic `{ success }` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Session record as kept by the ingestion server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub wallet_address: Option<String>,
    pub active: bool,
    pub created_at: i64,
    pub ended_at: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Page Visibility
// ─────────────────────────────────────────────────────────────────────────────

/// Document visibility as reported by the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Emitted by the orchestrator whenever the connected wallet changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionChanged {
    pub previous: Option<String>,
    pub current: Option<String>,
}

impl ConnectionChanged {
    pub fn new(previous: Option<String>, current: Option<String>) -> Self {
        Self { previous, current }
    }

    /// True when the wallet identity actually differs.
    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }

    /// The old wallet is leaving (disconnect or account switch).
    pub fn departed(&self) -> Option<&str> {
        match (&self.previous, &self.current) {
            (Some(prev), Some(cur)) if prev == cur => None,
            (Some(prev), _) => Some(prev),
            _ => None,
        }
    }

    /// The new wallet is arriving (connect or account switch).
    pub fn arrived(&self) -> Option<&str> {
        match (&self.previous, &self.current) {
            (Some(prev), Some(cur)) if prev == cur => None,
            (_, Some(cur)) => Some(cur),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_changed_departed_arrived() {
        let switch = ConnectionChanged::new(Some("X".into()), Some("Y".into()));
        assert_eq!(switch.departed(), Some("X"));
        assert_eq!(switch.arrived(), Some("Y"));

        let same = ConnectionChanged::new(Some("X".into()), Some("X".into()));
        assert!(!same.is_change());
        assert_eq!(same.departed(), None);
        assert_eq!(same.arrived(), None);

        let gone = ConnectionChanged::new(Some("X".into()), None);
        assert_eq!(gone.departed(), Some("X"));
        assert_eq!(gone.arrived(), None);
    }

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(EventKind::WalletDisconnect).unwrap(),
            json!("wallet_disconnect")
        );
        assert_eq!(EventKind::CourseComplete.to_string(), "course_complete");
        assert_eq!("page_view".parse::<EventKind>(), Ok(EventKind::PageView));
        assert!("pageview".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_tracking_event_omits_missing_session() {
        let event = TrackingEvent {
            kind: EventKind::Custom,
            payload: json!({ "type": "heartbeat" }),
            session_id: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({ "kind": "custom", "payload": { "type": "heartbeat" } }));
    }

    #[test]
    fn test_session_requests_are_camel_case() {
        let req = CreateSessionRequest {
            wallet_address: Some("Wa11et1".into()),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "walletAddress": "Wa11et1" })
        );

        let resp: CreateSessionResponse =
            serde_json::from_value(json!({ "sessionId": "s-1" })).unwrap();
        assert_eq!(resp.session_id, "s-1");
    }
}
