//! SessionManager - owns the single current session of an orchestrator.

use super::{heartbeat, SessionState};
use crate::api::SessionApi;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::tracking::TrackingClient;
use crate::types::{ConnectionChanged, Visibility};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Mutable session state. Never held across an await point.
#[derive(Debug, Default)]
struct Shared {
    state: SessionState,
    session_id: Option<String>,
    wallet: Option<String>,
    error: Option<String>,
    visibility: Visibility,
    heartbeat: Option<AbortHandle>,
}

impl Shared {
    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    fn heartbeat_running(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(|h| !h.is_finished())
    }
}

pub(super) struct Inner {
    api: Arc<dyn SessionApi>,
    pub(super) tracking: TrackingClient,
    config: SessionConfig,
    shared: Mutex<Shared>,
    session_tx: watch::Sender<Option<String>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a heartbeat for `session_id` may be sent right now.
    pub(super) fn should_beat(&self, session_id: &str) -> bool {
        let shared = self.lock();
        shared.state == SessionState::Active
            && shared.visibility == Visibility::Visible
            && shared.session_id.as_deref() == Some(session_id)
    }

    /// End a session, retrying with exponential back-off.
    async fn end_with_retry(&self, session_id: &str) -> Result<()> {
        let mut wait = self.config.end_retry_backoff();
        let mut retries_left = self.config.end_retry_attempts;

        loop {
            match self.api.end_session(session_id).await {
                Ok(()) => return Ok(()),
                Err(e) if retries_left > 0 => {
                    debug!(session_id = %session_id, error = %e, wait_ms = wait.as_millis() as u64, "End session failed, retrying");
                    tokio::time::sleep(wait).await;
                    wait = (wait * 2).min(Duration::from_secs(10));
                    retries_left -= 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Start (or restart) the heartbeat if the session is active and visible.
fn ensure_heartbeat(inner: &Arc<Inner>, shared: &mut Shared) {
    let Some(session_id) = shared.session_id.clone() else {
        return;
    };
    if shared.state != SessionState::Active || shared.visibility == Visibility::Hidden {
        return;
    }
    if shared.heartbeat_running() {
        return;
    }
    shared.stop_heartbeat();
    shared.heartbeat = Some(heartbeat::spawn(
        Arc::downgrade(inner),
        session_id,
        inner.config.heartbeat_interval(),
    ));
}

/// Rolls a transitional state back when the future driving it is dropped
/// before the API call returns.
struct Rollback<'a> {
    inner: &'a Arc<Inner>,
    during: SessionState,
    armed: bool,
}

impl<'a> Rollback<'a> {
    fn new(inner: &'a Arc<Inner>, during: SessionState) -> Self {
        Self {
            inner,
            during,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut shared = self.inner.lock();
        if shared.state != self.during {
            return;
        }
        match self.during {
            SessionState::Starting => {
                warn!("Session start cancelled");
                shared.state = SessionState::Idle;
                shared.error = Some("Session start cancelled".into());
            }
            SessionState::Ending => {
                warn!(session_id = ?shared.session_id, "Session end cancelled; keeping session");
                shared.state = SessionState::Active;
                if tokio::runtime::Handle::try_current().is_ok() {
                    ensure_heartbeat(self.inner, &mut shared);
                }
            }
            _ => {}
        }
    }
}

/// Owns the lifecycle of one logical session.
///
/// Dropping the manager aborts the heartbeat and, when a tokio runtime is
/// available, ends a still-active session in the background.
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn SessionApi>, tracking: TrackingClient, config: SessionConfig) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                api,
                tracking,
                config,
                shared: Mutex::new(Shared::default()),
                session_tx,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().session_id.clone()
    }

    pub fn wallet(&self) -> Option<String> {
        self.inner.lock().wallet.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn visibility(&self) -> Visibility {
        self.inner.lock().visibility
    }

    /// Whether a heartbeat loop is currently scheduled.
    pub fn is_heartbeating(&self) -> bool {
        self.inner.lock().heartbeat_running()
    }

    /// Watch the current session id.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.session_tx.subscribe()
    }

    /// Start a session, optionally bound to a wallet.
    ///
    /// No-op while a start is in flight or a session is already active; the
    /// current session id (if any) is returned in that case.
    pub async fn start_session(&self, wallet_address: Option<&str>) -> Option<String> {
        {
            let mut shared = self.inner.lock();
            if shared.state != SessionState::Idle {
                debug!(state = %shared.state, "Session start ignored");
                return shared.session_id.clone();
            }
            shared.state = SessionState::Starting;
            shared.error = None;
        }

        let rollback = Rollback::new(&self.inner, SessionState::Starting);
        let result = self.inner.api.create_session(wallet_address).await;
        rollback.disarm();

        let mut shared = self.inner.lock();
        match result {
            Ok(session_id) => {
                info!(session_id = %session_id, wallet = ?wallet_address, "Session started");
                shared.state = SessionState::Active;
                shared.session_id = Some(session_id.clone());
                shared.wallet = wallet_address.map(String::from);
                self.inner.session_tx.send_replace(Some(session_id.clone()));
                ensure_heartbeat(&self.inner, &mut shared);
                Some(session_id)
            }
            Err(e) => {
                warn!(error = %e, "Failed to start session");
                shared.state = SessionState::Idle;
                shared.error = Some(e.to_string());
                None
            }
        }
    }

    /// End the current session.
    ///
    /// Returns `true` once the server confirmed the end. On failure the error
    /// is recorded and the session id is kept, so the session stays active and
    /// a later call retries it.
    pub async fn end_session(&self) -> bool {
        let session_id = {
            let mut shared = self.inner.lock();
            if shared.state != SessionState::Active {
                debug!(state = %shared.state, "Session end ignored");
                return false;
            }
            let Some(session_id) = shared.session_id.clone() else {
                return false;
            };
            shared.state = SessionState::Ending;
            shared.stop_heartbeat();
            session_id
        };

        let rollback = Rollback::new(&self.inner, SessionState::Ending);
        let result = self.inner.end_with_retry(&session_id).await;
        rollback.disarm();

        let mut shared = self.inner.lock();
        match result {
            Ok(()) => {
                info!(session_id = %session_id, "Session ended");
                shared.state = SessionState::Idle;
                shared.session_id = None;
                shared.wallet = None;
                shared.error = None;
                self.inner.session_tx.send_replace(None);
                true
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to end session; keeping it");
                shared.state = SessionState::Active;
                shared.error = Some(e.to_string());
                ensure_heartbeat(&self.inner, &mut shared);
                false
            }
        }
    }

    /// Forget the current session locally without telling the server.
    ///
    /// Used when an end could not be confirmed but a new identity must take
    /// over. Returns the orphaned session id.
    pub fn abandon_session(&self) -> Option<String> {
        let mut shared = self.inner.lock();
        if shared.state == SessionState::Ending {
            return None;
        }
        shared.stop_heartbeat();
        let orphaned = shared.session_id.take();
        if let Some(ref id) = orphaned {
            warn!(session_id = %id, "Abandoning session that could not be ended");
        }
        shared.state = SessionState::Idle;
        shared.wallet = None;
        self.inner.session_tx.send_replace(None);
        orphaned
    }

    /// React to a page visibility change.
    ///
    /// Hidden pauses heartbeats; visible resumes them for the same session.
    pub fn set_visibility(&self, visibility: Visibility) {
        let mut shared = self.inner.lock();
        if shared.visibility == visibility {
            return;
        }
        shared.visibility = visibility;
        match visibility {
            Visibility::Hidden => {
                debug!("Page hidden, pausing heartbeat");
                shared.stop_heartbeat();
            }
            Visibility::Visible => {
                debug!("Page visible, resuming heartbeat");
                ensure_heartbeat(&self.inner, &mut shared);
            }
        }
    }

    /// Apply a wallet change: end the departing session, start one for the
    /// arriving wallet. End always completes before start.
    pub async fn handle(&self, change: &ConnectionChanged) {
        if change.departed().is_some() && self.session_id().is_some() && !self.end_session().await {
            self.abandon_session();
        }
        if let Some(address) = change.arrived() {
            self.start_session(Some(address)).await;
        }
    }

    /// Stop heartbeats and end an active session. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.inner.lock().stop_heartbeat();
        if self.is_active() {
            self.end_session().await;
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let mut shared = self.inner.lock();
        shared.stop_heartbeat();

        let Some(session_id) = shared.session_id.take() else {
            return;
        };
        shared.state = SessionState::Idle;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let api = Arc::clone(&self.inner.api);
                handle.spawn(async move {
                    if let Err(e) = api.end_session(&session_id).await {
                        warn!(session_id = %session_id, error = %e, "Failed to end session on teardown");
                    }
                });
            }
            Err(_) => {
                warn!(session_id = %session_id, "No runtime on teardown; session left open");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingApi};
    use std::sync::atomic::Ordering;

    fn manager_with(api: &Arc<RecordingApi>, config: SessionConfig) -> SessionManager {
        SessionManager::new(api.clone(), TrackingClient::new(api.clone()), config)
    }

    fn manager(api: &Arc<RecordingApi>) -> SessionManager {
        manager_with(api, SessionConfig::default())
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_session() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);
        let mut rx = sessions.subscribe();

        let id = sessions.start_session(Some("Wa11et1")).await;

        assert_eq!(id.as_deref(), Some("session-1"));
        assert_eq!(sessions.state(), SessionState::Active);
        assert_eq!(sessions.wallet().as_deref(), Some("Wa11et1"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some("session-1"));
        assert_eq!(api.calls(), vec![Call::CreateSession(Some("Wa11et1".into()))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_reentrancy_guarded() {
        let api = Arc::new(RecordingApi::new());
        api.create_delay_ms.store(200, Ordering::SeqCst);
        let sessions = manager(&api);

        let (a, b) = tokio::join!(sessions.start_session(None), sessions.start_session(None));
        assert_eq!(a.as_deref(), Some("session-1"));
        assert_eq!(b, None);

        for _ in 0..5 {
            assert_eq!(sessions.start_session(None).await.as_deref(), Some("session-1"));
        }
        assert_eq!(api.creates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_returns_to_idle() {
        let api = Arc::new(RecordingApi::new());
        api.fail_create.store(true, Ordering::SeqCst);
        let sessions = manager(&api);

        assert_eq!(sessions.start_session(None).await, None);
        assert_eq!(sessions.state(), SessionState::Idle);
        assert!(sessions.error().unwrap().contains("connection refused"));
        assert!(!sessions.is_heartbeating());

        api.fail_create.store(false, Ordering::SeqCst);
        assert!(sessions.start_session(None).await.is_some());
        assert_eq!(sessions.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_on_interval() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        sessions.start_session(None).await;
        sleep_secs(29).await;
        assert_eq!(api.heartbeats(), 0);

        sleep_secs(66).await;
        assert_eq!(api.heartbeats(), 3);
        assert!(
            api.events_of(crate::types::EventKind::Custom)
                .iter()
                .all(|e| e.session_id.as_deref() == Some("session-1"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_page_pauses_heartbeat() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        sessions.start_session(None).await;
        sleep_secs(35).await;
        assert_eq!(api.heartbeats(), 1);

        sessions.set_visibility(Visibility::Hidden);
        assert!(!sessions.is_heartbeating());
        sleep_secs(120).await;
        assert_eq!(api.heartbeats(), 1);
        assert!(sessions.is_active());

        sessions.set_visibility(Visibility::Visible);
        sleep_secs(31).await;
        assert_eq!(api.heartbeats(), 2);
        assert_eq!(api.creates(), 1);
        assert_eq!(sessions.session_id().as_deref(), Some("session-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_repeat_does_not_duplicate_loop() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        sessions.start_session(None).await;
        sessions.set_visibility(Visibility::Visible);
        sessions.set_visibility(Visibility::Hidden);
        sessions.set_visibility(Visibility::Visible);
        sessions.set_visibility(Visibility::Visible);

        sleep_secs(61).await;
        assert_eq!(api.heartbeats(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_stops_heartbeat() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        sessions.start_session(None).await;
        sleep_secs(31).await;
        assert!(sessions.end_session().await);

        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(sessions.session_id(), None);
        assert_eq!(api.ends(), vec!["session-1".to_string()]);

        sleep_secs(300).await;
        assert_eq!(api.heartbeats(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_without_session_is_noop() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        assert!(!sessions.end_session().await);
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_retries_then_succeeds() {
        let api = Arc::new(RecordingApi::new());
        api.fail_end.store(1, Ordering::SeqCst);
        let sessions = manager(&api);

        sessions.start_session(None).await;
        assert!(sessions.end_session().await);
        assert_eq!(api.ends().len(), 2);
        assert_eq!(sessions.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_failure_keeps_session() {
        let api = Arc::new(RecordingApi::new());
        api.fail_end.store(10, Ordering::SeqCst);
        let sessions = manager(&api);

        sessions.start_session(None).await;
        assert!(!sessions.end_session().await);

        // one attempt plus two retries
        assert_eq!(api.ends().len(), 3);
        assert_eq!(sessions.state(), SessionState::Active);
        assert_eq!(sessions.session_id().as_deref(), Some("session-1"));
        assert!(sessions.error().unwrap().contains("503"));
        assert!(sessions.is_heartbeating());

        assert_eq!(sessions.abandon_session().as_deref(), Some("session-1"));
        assert_eq!(sessions.state(), SessionState::Idle);
        assert!(!sessions.is_heartbeating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_switch_ends_before_start() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        sessions
            .handle(&ConnectionChanged::new(None, Some("X".into())))
            .await;
        sessions
            .handle(&ConnectionChanged::new(Some("X".into()), Some("Y".into())))
            .await;

        assert_eq!(
            api.calls(),
            vec![
                Call::CreateSession(Some("X".into())),
                Call::EndSession("session-1".into()),
                Call::CreateSession(Some("Y".into())),
            ]
        );
        assert_eq!(sessions.wallet().as_deref(), Some("Y"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_switch_abandons_unendable_session() {
        let api = Arc::new(RecordingApi::new());
        let config = SessionConfig {
            end_retry_attempts: 0,
            ..SessionConfig::default()
        };
        let sessions = manager_with(&api, config);

        sessions.start_session(Some("X")).await;
        api.fail_end.store(1, Ordering::SeqCst);
        sessions
            .handle(&ConnectionChanged::new(Some("X".into()), Some("Y".into())))
            .await;

        assert_eq!(sessions.session_id().as_deref(), Some("session-2"));
        assert_eq!(api.creates(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_once() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);

        sessions.start_session(None).await;
        sessions.shutdown().await;
        sessions.shutdown().await;

        assert_eq!(api.ends().len(), 1);
        assert!(!sessions.is_heartbeating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_ends_active_session() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);
        sessions.start_session(None).await;

        drop(sessions);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(api.ends(), vec!["session-1".to_string()]);
        sleep_secs(120).await;
        assert_eq!(api.heartbeats(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_start_returns_to_idle() {
        let api = Arc::new(RecordingApi::new());
        api.create_delay_ms.store(500, Ordering::SeqCst);
        let sessions = manager(&api);

        let cancelled = tokio::time::timeout(Duration::from_millis(100), sessions.start_session(None)).await;
        assert!(cancelled.is_err());
        assert_eq!(sessions.state(), SessionState::Idle);
        assert_eq!(sessions.error().as_deref(), Some("Session start cancelled"));

        api.create_delay_ms.store(0, Ordering::SeqCst);
        assert_eq!(sessions.start_session(None).await.as_deref(), Some("session-1"));
        assert!(sessions.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_end_keeps_session() {
        let api = Arc::new(RecordingApi::new());
        let sessions = manager(&api);
        sessions.start_session(None).await;

        api.fail_end.store(10, Ordering::SeqCst);
        let cancelled = tokio::time::timeout(Duration::from_millis(100), sessions.end_session()).await;
        assert!(cancelled.is_err());

        // first attempt failed, cancelled during the back-off
        assert_eq!(api.ends().len(), 1);
        assert_eq!(sessions.state(), SessionState::Active);
        assert_eq!(sessions.session_id().as_deref(), Some("session-1"));
        assert!(sessions.is_heartbeating());

        assert_eq!(sessions.abandon_session().as_deref(), Some("session-1"));
        assert_eq!(sessions.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_heartbeat_interval_still_beats() {
        let api = Arc::new(RecordingApi::new());
        let config = SessionConfig {
            heartbeat_interval_ms: 0,
            ..SessionConfig::default()
        };
        let sessions = manager_with(&api, config);

        sessions.start_session(None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(api.heartbeats() >= 1);
        assert!(sessions.is_heartbeating());
    }
}
