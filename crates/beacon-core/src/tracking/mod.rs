//! Fire-and-forget tracking client.
//!
//! Every call resolves to a [`TrackResult`]; delivery failures are logged and
//! swallowed so tracking can never interrupt the primary flow. Events are sent
//! at most once and never queued.

use crate::api::EventSink;
use crate::types::{EventKind, TrackResult, TrackingEvent};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stateless transport for tracking events.
#[derive(Clone)]
pub struct TrackingClient {
    sink: Arc<dyn EventSink>,
    enabled: bool,
}

impl TrackingClient {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            enabled: true,
        }
    }

    /// Disable delivery entirely; calls then succeed without sending anything.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send an event of any kind.
    pub async fn send(&self, kind: EventKind, payload: Value, session_id: Option<&str>) -> TrackResult {
        if !self.enabled {
            return TrackResult::ok();
        }

        let event = TrackingEvent {
            kind,
            payload,
            session_id: session_id.map(String::from),
        };

        match self.sink.send_event(&event).await {
            Ok(()) => {
                debug!(kind = %kind, session_id = ?event.session_id, "Tracked event");
                TrackResult::ok()
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to track event");
                TrackResult::failed(e.to_string())
            }
        }
    }

    /// Send on a detached task; the caller never waits for delivery.
    ///
    /// For callers outside the session lifecycle only. Lifecycle events and
    /// heartbeats go through the awaited `log_*` methods: a detached send
    /// escapes the heartbeat's abort handle and could land after the session
    /// end it should precede.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fire(&self, kind: EventKind, payload: Value, session_id: Option<String>) {
        let client = self.clone();
        tokio::spawn(async move {
            client.send(kind, payload, session_id.as_deref()).await;
        });
    }

    pub async fn log_page_view(
        &self,
        path: &str,
        referrer: Option<&str>,
        session_id: Option<&str>,
    ) -> TrackResult {
        let mut payload = json!({ "path": path, "timestamp": now() });
        if let Some(referrer) = referrer {
            payload["referrer"] = json!(referrer);
        }
        self.send(EventKind::PageView, payload, session_id).await
    }

    pub async fn log_wallet_connect(&self, address: &str, session_id: Option<&str>) -> TrackResult {
        let payload = json!({ "address": address, "timestamp": now() });
        self.send(EventKind::WalletConnect, payload, session_id).await
    }

    pub async fn log_wallet_disconnect(&self, address: &str, session_id: Option<&str>) -> TrackResult {
        let payload = json!({ "address": address, "timestamp": now() });
        self.send(EventKind::WalletDisconnect, payload, session_id).await
    }

    pub async fn log_course_start(&self, slug: &str, session_id: Option<&str>) -> TrackResult {
        let payload = json!({ "courseSlug": slug, "timestamp": now() });
        self.send(EventKind::CourseStart, payload, session_id).await
    }

    pub async fn log_course_complete(&self, slug: &str, session_id: Option<&str>) -> TrackResult {
        let payload = json!({ "courseSlug": slug, "timestamp": now() });
        self.send(EventKind::CourseComplete, payload, session_id).await
    }

    /// Custom event; `name` lands in the payload's `type` field.
    pub async fn log_custom(&self, name: &str, data: Value, session_id: Option<&str>) -> TrackResult {
        let mut payload = json!({ "type": name, "timestamp": now() });
        if let Value::Object(fields) = data {
            for (k, v) in fields {
                if k != "type" {
                    payload[k] = v;
                }
            }
        } else if !data.is_null() {
            payload["data"] = data;
        }
        self.send(EventKind::Custom, payload, session_id).await
    }

    pub async fn log_heartbeat(&self, session_id: &str) -> TrackResult {
        self.log_custom("heartbeat", Value::Null, Some(session_id)).await
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}
