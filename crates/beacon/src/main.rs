//! beacon - Beacon CLI
//!
//! Send tracking events, manage sessions and run scripted wallet lifecycles
//! against a Beacon API.

use anyhow::Result;
use beacon_core::BeaconConfig;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("beacon=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = BeaconConfig::load()?;
    if let Some(url) = cli.api_url {
        config.api.url = url;
    }

    // Execute command
    match cli.command {
        Commands::Track(cmd) => commands::track::execute(cmd, &config).await,
        Commands::Session(cmd) => commands::session::execute(cmd, &config).await,
        Commands::Simulate(args) => commands::simulate::execute(args, &config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, &config),
        Commands::Health => commands::health(&config).await,
        Commands::Version => {
            println!("beacon {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
