//! Debounced page view reporting.
//!
//! The first route observed is the landing page and is never reported. Each
//! later change restarts a trailing-edge debounce window; when it elapses a
//! single `page_view` goes out for the final destination, with the last
//! reported route as referrer.

use crate::tracking::TrackingClient;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct RouteState {
    /// Last reported route (or the landing route).
    settled: Option<String>,
    /// Route waiting for the debounce window to elapse.
    pending: Option<String>,
    timer: Option<AbortHandle>,
    generation: u64,
}

impl RouteState {
    fn cancel_pending(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.pending = None;
    }
}

struct Inner {
    tracking: TrackingClient,
    debounce: Duration,
    session: watch::Receiver<Option<String>>,
    state: Mutex<RouteState>,
    follower: Mutex<Option<AbortHandle>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RouteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn observe(self: &Arc<Self>, path: &str) {
        let mut state = self.lock();

        let Some(settled) = state.settled.clone() else {
            debug!(path = %path, "Landing route recorded");
            state.settled = Some(path.to_string());
            return;
        };

        if state.pending.as_deref() == Some(path) {
            return;
        }
        state.cancel_pending();
        if settled == path {
            debug!(path = %path, "Returned to last reported route");
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        let destination = path.to_string();
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.flush(generation, destination).await;
        });

        state.pending = Some(path.to_string());
        state.timer = Some(handle.abort_handle());
    }

    async fn flush(&self, generation: u64, destination: String) {
        let referrer = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.pending = None;
            state.timer = None;
            state.settled.replace(destination.clone())
        };

        let session_id = self.session.borrow().clone();
        self.tracking
            .log_page_view(&destination, referrer.as_deref(), session_id.as_deref())
            .await;
    }
}

/// Reports route changes as debounced `page_view` events.
pub struct PageViewTracker {
    inner: Arc<Inner>,
}

impl PageViewTracker {
    /// `session` supplies the session id attached to each report.
    pub fn new(
        tracking: TrackingClient,
        debounce: Duration,
        session: watch::Receiver<Option<String>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tracking,
                debounce,
                session,
                state: Mutex::new(RouteState::default()),
                follower: Mutex::new(None),
            }),
        }
    }

    /// Tracker whose reports carry no session id.
    pub fn without_session(tracking: TrackingClient, debounce: Duration) -> Self {
        let (_, session) = watch::channel(None);
        Self::new(tracking, debounce, session)
    }

    /// Observe the current route. Must be called within a tokio runtime.
    pub fn observe(&self, path: &str) {
        self.inner.observe(path);
    }

    /// Follow a router's current-path observable until cancelled.
    pub fn follow(&self, mut routes: watch::Receiver<String>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let first = routes.borrow_and_update().clone();
            match weak.upgrade() {
                Some(inner) => inner.observe(&first),
                None => return,
            }
            while routes.changed().await.is_ok() {
                let path = routes.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.observe(&path);
            }
        });

        let mut follower = self.inner.follower.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = follower.replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Route last reported (or the landing route).
    pub fn current(&self) -> Option<String> {
        self.inner.lock().settled.clone()
    }

    /// Route waiting on the debounce window, if any.
    pub fn pending(&self) -> Option<String> {
        self.inner.lock().pending.clone()
    }

    /// Drop any pending report and stop following the router.
    pub fn cancel(&self) {
        self.inner.lock().cancel_pending();
        let mut follower = self.inner.follower.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = follower.take() {
            handle.abort();
        }
    }
}

impl Drop for PageViewTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}
