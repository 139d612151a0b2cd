//! Seams to the remote session/tracking service.
//!
//! [`crate::client::ApiClient`] implements both traits over HTTP; tests use
//! in-memory fakes.

use crate::error::Result;
use crate::types::TrackingEvent;
use async_trait::async_trait;

/// Creates and ends server-side sessions.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// `POST /session`. Returns the server-issued session id.
    async fn create_session(&self, wallet_address: Option<&str>) -> Result<String>;

    /// `PATCH /session`.
    async fn end_session(&self, session_id: &str) -> Result<()>;
}

/// Delivers a single tracking event.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// `POST /track`.
    async fn send_event(&self, event: &TrackingEvent) -> Result<()>;
}
