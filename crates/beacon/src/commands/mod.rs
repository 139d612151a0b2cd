//! Command implementations for the beacon CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod session;
pub mod simulate;
pub mod track;

use anyhow::{Context, Result};
use beacon_core::client::ApiClient;
use beacon_core::BeaconConfig;
use colored::Colorize;

/// Build the API client for the configured URL.
pub(crate) fn client(config: &BeaconConfig) -> Result<ApiClient> {
    ApiClient::new(&config.api).with_context(|| format!("Failed to create client for {}", config.api.url))
}

/// Check API health
pub async fn health(config: &BeaconConfig) -> Result<()> {
    let client = client(config)?;
    match client.health().await {
        Ok(health) => {
            println!(
                "{} {} ({} v{})",
                "●".green(),
                client.base_url(),
                health.status,
                health.version
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {} unreachable", "●".red(), client.base_url());
            Err(e.into())
        }
    }
}
