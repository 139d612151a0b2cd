//! In-memory fakes shared by the unit tests.

use crate::api::{EventSink, SessionApi};
use crate::error::{Error, Result};
use crate::types::{EventKind, TrackingEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One observed call against the fake API, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSession(Option<String>),
    EndSession(String),
    Event(TrackingEvent),
}

/// Records every session and tracking call; failures can be injected.
#[derive(Debug, Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    pub fail_create: AtomicBool,
    pub fail_events: AtomicBool,
    /// Number of upcoming end calls that fail.
    pub fail_end: AtomicU32,
    pub create_delay_ms: AtomicU64,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<TrackingEvent> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<TrackingEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }

    pub fn heartbeats(&self) -> usize {
        self.events_of(EventKind::Custom)
            .iter()
            .filter(|e| e.payload["type"] == "heartbeat")
            .count()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateSession(_)))
            .count()
    }

    pub fn ends(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::EndSession(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SessionApi for RecordingApi {
    async fn create_session(&self, wallet_address: Option<&str>) -> Result<String> {
        self.record(Call::CreateSession(wallet_address.map(String::from)));
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("session-{}", id))
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        self.record(Call::EndSession(session_id.to_string()));
        let remaining = self.fail_end.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_end.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::api(503, "unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for RecordingApi {
    async fn send_event(&self, event: &TrackingEvent) -> Result<()> {
        self.record(Call::Event(event.clone()));
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(Error::Network("ingest down".into()));
        }
        Ok(())
    }
}
