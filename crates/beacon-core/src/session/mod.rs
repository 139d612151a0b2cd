//! Session lifecycle management.
//!
//! A session moves through `Idle → Starting → Active → Ending → Idle`:
//! - `start_session`: create the server-side session and begin heartbeats
//! - `end_session`: stop heartbeats and close the session on the server
//! - `set_visibility`: pause/resume heartbeats without touching the session

mod heartbeat;
mod manager;

pub use manager::SessionManager;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Active,
    Ending,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ending => write!(f, "ending"),
        }
    }
}
