//! Connection orchestration.
//!
//! Drives the wallet provider, owns the session and wallet state, and wires
//! the session manager, wallet tracker and page view tracker together.
//!
//! Status flow: `Disconnected → Connecting → Connected → Disconnected`.

mod connection;

pub use connection::{ConnectionOrchestrator, Services};

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// UI-facing wallet connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub status: ConnectionStatus,
    pub wallet: Option<String>,
    /// Derived from the current wallet; always false unless connected.
    pub is_admin: bool,
    pub loading: bool,
    pub error: Option<String>,
    /// Last session start/end failure. Does not affect `status`.
    pub session_error: Option<String>,
}

impl WalletState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Result of [`ConnectionOrchestrator::connect_wallet`].
#[derive(Debug)]
pub enum ConnectOutcome {
    /// Connected with this address.
    Connected(String),
    /// Sent out to the wallet app through this deep link.
    Redirected(String),
    /// Connection failed; the same error is in `WalletState::error`.
    Failed(Error),
}

impl ConnectOutcome {
    pub fn address(&self) -> Option<&str> {
        match self {
            ConnectOutcome::Connected(address) => Some(address),
            _ => None,
        }
    }
}
