//! Scripted lifecycle simulation.
//!
//! Drives a real `ConnectionOrchestrator` against the configured API with a
//! scripted wallet provider standing in for the browser extension.

use anyhow::{Context, Result};
use async_trait::async_trait;
use beacon_core::storage::MemoryStore;
use beacon_core::wallet::{AllowList, Environment, ProviderRejection, WalletProvider};
use beacon_core::{BeaconConfig, ConnectOutcome, ConnectionOrchestrator, Services, WalletState};
use colored::Colorize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use crate::cli::SimulateArgs;

/// Wallet provider that follows a fixed script.
///
/// Never trusted on the first visit, so connecting always goes through the
/// (scripted) approval prompt.
pub struct ScriptedProvider {
    address: String,
    reject: bool,
    connected: Mutex<Option<String>>,
    accounts: broadcast::Sender<Option<String>>,
}

impl ScriptedProvider {
    pub fn new(address: impl Into<String>, reject: bool) -> Self {
        let (accounts, _) = broadcast::channel(8);
        Self {
            address: address.into(),
            reject,
            connected: Mutex::new(None),
            accounts,
        }
    }

    /// Switch the active account, as if the user picked another one.
    pub fn switch_account(&self, address: Option<&str>) {
        *self.connected.lock().unwrap_or_else(|e| e.into_inner()) = address.map(String::from);
        // nobody listening before mount
        let _ = self.accounts.send(address.map(String::from));
    }
}

#[async_trait]
impl WalletProvider for ScriptedProvider {
    async fn connect(&self, only_if_trusted: bool) -> std::result::Result<String, ProviderRejection> {
        if only_if_trusted {
            return Err(ProviderRejection::new(Some(4100), "Site is not trusted yet"));
        }
        if self.reject {
            return Err(ProviderRejection::user_rejected());
        }
        *self.connected.lock().unwrap_or_else(|e| e.into_inner()) = Some(self.address.clone());
        Ok(self.address.clone())
    }

    fn public_key(&self) -> Option<String> {
        self.connected.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn account_changes(&self) -> broadcast::Receiver<Option<String>> {
        self.accounts.subscribe()
    }
}

/// Host environment for the simulation.
pub struct ScriptedEnvironment {
    provider: Arc<ScriptedProvider>,
    mobile: bool,
    url: String,
}

impl Environment for ScriptedEnvironment {
    fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        Some(self.provider.clone())
    }

    fn is_mobile(&self) -> bool {
        self.mobile
    }

    fn current_url(&self) -> Option<String> {
        Some(self.url.clone())
    }

    fn open_url(&self, url: &str) {
        println!("  {} {}", "→ open".dimmed(), url);
    }
}

pub async fn execute(args: SimulateArgs, config: &BeaconConfig) -> Result<()> {
    let client = Arc::new(super::client(config)?);
    let provider = Arc::new(ScriptedProvider::new(&args.wallet, args.reject));
    let env = Arc::new(ScriptedEnvironment {
        provider: provider.clone(),
        mobile: args.mobile,
        url: config.wallet.app_url.clone(),
    });
    let services = Services {
        session_api: client.clone(),
        events: client.clone(),
        storage: Arc::new(MemoryStore::new()),
        admin: Arc::new(AllowList::new(config.wallet.admin_wallets.clone())),
    };
    let orchestrator = ConnectionOrchestrator::new(env, services, config);
    let dwell = Duration::from_millis(args.dwell_ms);

    println!("{}", "Simulating wallet lifecycle...".cyan());
    println!("  API: {}", client.base_url());

    let mut routes = args.routes.iter();
    let landing = routes.next().cloned().unwrap_or_else(|| "/".to_string());
    let (route_tx, route_rx) = watch::channel(landing.clone());
    orchestrator.follow_routes(route_rx);
    step(&format!("Landed on {}", landing));

    orchestrator.mount().await;
    step("Mounted");

    match orchestrator.connect_wallet().await {
        ConnectOutcome::Connected(address) => {
            step(&format!("Connected {}", address));
            print_state(&orchestrator.state());
        }
        ConnectOutcome::Redirected(link) => {
            step("Redirected to the wallet app");
            println!("  Link: {}", link);
            orchestrator.unmount().await;
            return Ok(());
        }
        ConnectOutcome::Failed(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            print_state(&orchestrator.state());
            orchestrator.unmount().await;
            return Ok(());
        }
    }

    for route in routes {
        route_tx.send_replace(route.clone());
        step(&format!("Navigated to {}", route));
        tokio::time::sleep(dwell).await;
    }

    if let Some(ref slug) = args.course {
        orchestrator.log_course_start(slug).await;
        step(&format!("Started course {}", slug));
        tokio::time::sleep(dwell).await;
        orchestrator.log_course_complete(slug).await;
        step(&format!("Completed course {}", slug));
    }

    if let Some(ref next) = args.switch_to {
        let mut state = orchestrator.subscribe();
        provider.switch_account(Some(next));
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| s.wallet.as_deref() == Some(next.as_str())),
        )
        .await
        .context("Timed out waiting for the account switch")?
        .context("Orchestrator went away during the account switch")?;
        step(&format!("Switched account to {}", next));
        print_state(&orchestrator.state());
    }

    orchestrator.disconnect_wallet().await;
    step("Disconnected");
    print_state(&orchestrator.state());

    orchestrator.unmount().await;
    step("Unmounted");

    match client.recorded_events().await {
        Ok(events) => {
            println!();
            println!("{}", "Recorded events:".cyan().bold());
            for event in events {
                println!(
                    "  {:<18} session={} {}",
                    event.kind.to_string(),
                    event.session_id.as_deref().unwrap_or("-"),
                    event.payload
                );
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Event listing unavailable");
            println!("{}", "(event listing requires beacon-server)".dimmed());
        }
    }

    Ok(())
}

fn step(label: &str) {
    println!("{} {}", "●".green(), label);
}

fn print_state(state: &WalletState) {
    println!(
        "  status={} wallet={} admin={}",
        state.status,
        state.wallet.as_deref().unwrap_or("-"),
        state.is_admin
    );
    if let Some(ref error) = state.error {
        println!("  {} {}", "error:".red(), error);
    }
    if let Some(ref error) = state.session_error {
        println!("  {} {}", "session error:".yellow(), error);
    }
}
