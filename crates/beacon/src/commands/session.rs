//! Session management commands.
//!
//! Talks to the session API directly; `list` needs the development server.

use anyhow::{Context, Result};
use beacon_core::api::SessionApi;
use beacon_core::BeaconConfig;
use colored::Colorize;

use crate::cli::{SessionAction, SessionCommand};

pub async fn execute(cmd: SessionCommand, config: &BeaconConfig) -> Result<()> {
    match cmd.action {
        SessionAction::Start { wallet } => start(wallet.as_deref(), config).await,
        SessionAction::End { session_id } => end(&session_id, config).await,
        SessionAction::List { all } => list(all, config).await,
    }
}

async fn start(wallet: Option<&str>, config: &BeaconConfig) -> Result<()> {
    let client = super::client(config)?;
    let session_id = client
        .create_session(wallet)
        .await
        .context("Failed to start session")?;

    println!("{} Session started", "✓".green());
    println!("  ID: {}", session_id);
    if let Some(wallet) = wallet {
        println!("  Wallet: {}", wallet);
    }
    Ok(())
}

async fn end(session_id: &str, config: &BeaconConfig) -> Result<()> {
    let client = super::client(config)?;
    client
        .end_session(session_id)
        .await
        .with_context(|| format!("Failed to end session {}", session_id))?;

    println!("{} Session {} ended", "✓".green(), session_id);
    Ok(())
}

async fn list(all: bool, config: &BeaconConfig) -> Result<()> {
    let client = super::client(config)?;
    let sessions = client
        .recorded_sessions()
        .await
        .context("Failed to list sessions (is beacon-server running?)")?;

    let sessions: Vec<_> = sessions.into_iter().filter(|s| all || s.active).collect();
    if sessions.is_empty() {
        println!("{}", "No sessions".yellow());
        return Ok(());
    }

    println!("{}", "Sessions:".cyan().bold());
    for session in sessions {
        let status = if session.active {
            "active".green()
        } else {
            "ended".dimmed()
        };
        println!(
            "  {} [{}] wallet={}",
            session.session_id,
            status,
            session.wallet_address.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
