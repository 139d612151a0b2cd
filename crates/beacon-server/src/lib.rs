//! beacon-server - Beacon development ingestion server
//!
//! In-memory implementation of the session and tracking HTTP API consumed by
//! `beacon_core::client::ApiClient`.

pub mod config;
pub mod routes;
pub mod state;

pub use config::Config;
pub use routes::create_router;
pub use state::AppState;
