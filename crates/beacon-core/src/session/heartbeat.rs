//! Heartbeat loop for an active session.

use super::manager::Inner;
use std::sync::Weak;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// Spawn the heartbeat task for `session_id`.
///
/// The first beat fires one `period` after spawning. The task exits on its own
/// as soon as the session is no longer active, the page is hidden, or the
/// manager is gone; callers still abort it through the returned handle.
pub(super) fn spawn(inner: Weak<Inner>, session_id: String, period: Duration) -> AbortHandle {
    debug!(session_id = %session_id, period_ms = period.as_millis() as u64, "Starting heartbeat");

    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };
            if !inner.should_beat(&session_id) {
                debug!(session_id = %session_id, "Heartbeat loop exiting");
                break;
            }

            // awaited so that aborting the loop also drops an in-flight beat
            let result = inner.tracking.log_heartbeat(&session_id).await;
            if !result.success {
                debug!(session_id = %session_id, "Heartbeat not delivered");
            }
        }
    });

    handle.abort_handle()
}
