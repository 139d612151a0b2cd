//! Tracking commands.

use anyhow::{bail, Context, Result};
use beacon_core::types::TrackResult;
use beacon_core::{BeaconConfig, TrackingClient};
use colored::Colorize;
use serde_json::Value;
use std::sync::Arc;

use crate::cli::{TrackAction, TrackCommand};

pub async fn execute(cmd: TrackCommand, config: &BeaconConfig) -> Result<()> {
    let client = Arc::new(super::client(config)?);
    let tracking = TrackingClient::new(client).with_enabled(config.tracking.enabled);
    if !tracking.is_enabled() {
        println!("{}", "Tracking is disabled in configuration; nothing sent".yellow());
        return Ok(());
    }

    let session = cmd.session.as_deref();
    let (label, result) = match cmd.action {
        TrackAction::PageView { path, referrer } => (
            format!("page_view {}", path),
            tracking.log_page_view(&path, referrer.as_deref(), session).await,
        ),
        TrackAction::Connect { address } => (
            format!("wallet_connect {}", address),
            tracking.log_wallet_connect(&address, session).await,
        ),
        TrackAction::Disconnect { address } => (
            format!("wallet_disconnect {}", address),
            tracking.log_wallet_disconnect(&address, session).await,
        ),
        TrackAction::CourseStart { slug } => (
            format!("course_start {}", slug),
            tracking.log_course_start(&slug, session).await,
        ),
        TrackAction::CourseComplete { slug } => (
            format!("course_complete {}", slug),
            tracking.log_course_complete(&slug, session).await,
        ),
        TrackAction::Custom { name, data } => {
            let data = parse_data(data.as_deref())?;
            (
                format!("custom {}", name),
                tracking.log_custom(&name, data, session).await,
            )
        }
    };

    report(&label, result)
}

fn parse_data(data: Option<&str>) -> Result<Value> {
    match data {
        Some(raw) => serde_json::from_str(raw).with_context(|| format!("Invalid JSON for --data: {}", raw)),
        None => Ok(Value::Null),
    }
}

fn report(label: &str, result: TrackResult) -> Result<()> {
    if result.success {
        println!("{} Tracked {}", "✓".green(), label);
        Ok(())
    } else {
        let error = result.error.unwrap_or_else(|| "unknown error".to_string());
        println!("{} Failed to track {}", "✗".red(), label);
        bail!(error)
    }
}
