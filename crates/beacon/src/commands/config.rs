//! Configuration commands.

use anyhow::{bail, Context, Result};
use beacon_core::BeaconConfig;
use colored::Colorize;
use std::path::Path;

use crate::cli::{ConfigAction, ConfigCommand};

pub fn execute(cmd: ConfigCommand, config: &BeaconConfig) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => show(config),
        ConfigAction::Path => {
            println!("{}", BeaconConfig::config_path().display());
            Ok(())
        }
        ConfigAction::Init { force } => init(&BeaconConfig::config_path(), force),
    }
}

fn show(config: &BeaconConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", format!("# {}", BeaconConfig::config_path().display()).dimmed());
    print!("{}", rendered);
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    BeaconConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}
