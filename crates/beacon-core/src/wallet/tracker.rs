//! Wallet tracking adapter.

use crate::tracking::TrackingClient;
use crate::types::{ConnectionChanged, TrackResult};
use std::sync::Mutex;
use tracing::debug;

/// Logs `wallet_connect` whenever a new wallet address appears.
///
/// Disconnects are never inferred from the address going away; the owner
/// calls [`WalletTracker::log_disconnect`] so that during an account switch the
/// old wallet's disconnect is logged before the new wallet's connect.
pub struct WalletTracker {
    tracking: TrackingClient,
    auto_start: bool,
    last: Mutex<Option<String>>,
}

impl WalletTracker {
    pub fn new(tracking: TrackingClient, auto_start: bool) -> Self {
        Self {
            tracking,
            auto_start,
            last: Mutex::new(None),
        }
    }

    /// Last address seen.
    pub fn current(&self) -> Option<String> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Observe the externally supplied address.
    ///
    /// Returns the tracking result when a connect was logged.
    pub async fn observe(&self, address: Option<&str>, session_id: Option<&str>) -> Option<TrackResult> {
        let arrived = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_deref() == address {
                return None;
            }
            *last = address.map(String::from);
            address.map(String::from)
        };

        let address = arrived?;
        if !self.auto_start {
            debug!(address = %address, "Wallet changed; auto tracking disabled");
            return None;
        }
        Some(self.tracking.log_wallet_connect(&address, session_id).await)
    }

    /// Explicitly log a disconnect for `address`.
    pub async fn log_disconnect(&self, address: &str, session_id: Option<&str>) -> TrackResult {
        {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_deref() == Some(address) {
                *last = None;
            }
        }
        self.tracking.log_wallet_disconnect(address, session_id).await
    }

    /// Consume a connection change message.
    pub async fn handle(&self, change: &ConnectionChanged, session_id: Option<&str>) -> Option<TrackResult> {
        self.observe(change.current.as_deref(), session_id).await
    }
}
