//! beacon-core - Core library for Beacon
//!
//! Session, wallet connection and tracking lifecycle for a learning platform
//! frontend, shared by the beacon CLI and beacon-server:
//!
//! - **api**: Session and event sink seams
//! - **client**: HTTP client for the tracking API
//! - **config**: TOML configuration with environment overrides
//! - **tracking**: Fire-and-forget event delivery
//! - **session**: Session lifecycle and heartbeat
//! - **wallet**: Wallet provider, admin check and connect tracking
//! - **pageview**: Debounced page view reporting
//! - **orchestrator**: Connection state machine tying it all together
//! - **storage**: Persistent key-value mirror of wallet state

pub mod api;
#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pageview;
pub mod session;
pub mod storage;
pub mod tracking;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::BeaconConfig;
pub use error::{Error, Result};
pub use orchestrator::{ConnectOutcome, ConnectionOrchestrator, ConnectionStatus, Services, WalletState};
pub use session::{SessionManager, SessionState};
pub use tracking::TrackingClient;
pub use types::{EventKind, TrackResult, TrackingEvent};
