//! ConnectionOrchestrator - top-level wallet connection state machine.
//!
//! All state-changing operations (connect, disconnect, account changes,
//! auto-reconnect) run under one async operation lock so that a session is
//! always ended before the next one starts.

use super::{ConnectOutcome, ConnectionStatus, WalletState};
use crate::api::{EventSink, SessionApi};
use crate::config::BeaconConfig;
use crate::error::Error;
use crate::pageview::PageViewTracker;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, IS_ADMIN_KEY, WALLET_ADDRESS_KEY};
use crate::tracking::TrackingClient;
use crate::types::{ConnectionChanged, TrackResult, Visibility};
use crate::wallet::{deep_link, AdminCheck, Environment, WalletTracker};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// External collaborators of the orchestrator.
pub struct Services {
    pub session_api: Arc<dyn SessionApi>,
    pub events: Arc<dyn EventSink>,
    pub storage: Arc<dyn KeyValueStore>,
    pub admin: Arc<dyn AdminCheck>,
}

#[cfg(feature = "client")]
impl Services {
    /// HTTP API client, file-backed storage and the configured allow-list.
    pub fn from_config(config: &BeaconConfig) -> crate::Result<Self> {
        let client = Arc::new(crate::client::ApiClient::new(&config.api)?);
        let storage = Arc::new(crate::storage::FileStore::open(&config.storage.path)?);
        let admin = Arc::new(crate::wallet::AllowList::new(config.wallet.admin_wallets.clone()));
        if admin.is_empty() {
            debug!("No admin wallets configured");
        } else {
            debug!(admins = admin.len(), "Admin allow-list loaded");
        }
        Ok(Self {
            session_api: client.clone(),
            events: client,
            storage,
            admin,
        })
    }
}

/// Per-mount background tasks.
#[derive(Default)]
struct Tasks {
    mounted: bool,
    /// Dropping the sender stops the account listener once its current
    /// operation, if any, has finished.
    listener_stop: Option<watch::Sender<()>>,
    admin_resolution: Option<AbortHandle>,
}

impl Tasks {
    fn abort_admin(&mut self) {
        if let Some(handle) = self.admin_resolution.take() {
            handle.abort();
        }
    }

    fn stop_all(&mut self) {
        self.abort_admin();
        self.listener_stop = None;
        self.mounted = false;
    }
}

struct Inner {
    env: Arc<dyn Environment>,
    storage: Arc<dyn KeyValueStore>,
    admin: Arc<dyn AdminCheck>,
    tracking: TrackingClient,
    sessions: SessionManager,
    wallet_tracker: WalletTracker,
    pages: PageViewTracker,
    deep_link_base: String,
    app_url: String,
    state_tx: watch::Sender<WalletState>,
    changes_tx: broadcast::Sender<ConnectionChanged>,
    op_lock: tokio::sync::Mutex<()>,
    tasks: Mutex<Tasks>,
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wallet(&self) -> Option<String> {
        self.state_tx.borrow().wallet.clone()
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.storage.set(key, value),
            None => self.storage.remove(key),
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "Failed to update local storage");
        }
    }

    /// Reset to the disconnected baseline, keeping `error`.
    fn reset(&self, error: Option<String>) {
        let session_error = self.sessions.error();
        self.state_tx.send_replace(WalletState {
            error,
            session_error,
            ..WalletState::default()
        });
        self.persist(WALLET_ADDRESS_KEY, None);
        self.persist(IS_ADMIN_KEY, None);
    }

    /// Deliver a connection change to the session manager, then the wallet
    /// tracker, then external subscribers.
    async fn dispatch(&self, change: &ConnectionChanged) {
        if !change.is_change() {
            debug!(wallet = ?change.current, "Connection unchanged, nothing to dispatch");
            return;
        }
        self.sessions.handle(change).await;
        let session_id = self.sessions.session_id();
        self.wallet_tracker.handle(change, session_id.as_deref()).await;

        let session_error = self.sessions.error();
        self.state_tx.send_modify(|s| s.session_error = session_error);

        // no subscribers is fine
        let _ = self.changes_tx.send(change.clone());
    }

    async fn connect(self: &Arc<Self>) -> ConnectOutcome {
        if let Some(address) = self.wallet() {
            debug!(address = %address, "Already connected");
            return ConnectOutcome::Connected(address);
        }

        if self.env.is_mobile() && !self.env.in_wallet_browser() {
            let target = self.env.current_url().unwrap_or_else(|| self.app_url.clone());
            let link = deep_link(&self.deep_link_base, &target);
            info!(link = %link, "Redirecting to wallet app");
            self.env.open_url(&link);
            return ConnectOutcome::Redirected(link);
        }

        let Some(provider) = self.env.provider() else {
            warn!("No wallet provider injected");
            self.reset(Some(Error::ProviderMissing.to_string()));
            return ConnectOutcome::Failed(Error::ProviderMissing);
        };

        self.state_tx.send_modify(|s| {
            s.status = ConnectionStatus::Connecting;
            s.loading = true;
            s.error = None;
        });

        let address = match provider.connect(true).await {
            Ok(address) => address,
            Err(trusted) => {
                debug!(reason = %trusted, "Trusted connect refused, prompting user");
                match provider.connect(false).await {
                    Ok(address) => address,
                    Err(rejection) => {
                        let err = rejection.classify();
                        warn!(reason = %rejection, error = %err, "Wallet connection failed");
                        self.reset(Some(err.to_string()));
                        return ConnectOutcome::Failed(err);
                    }
                }
            }
        };

        self.adopt(None, &address).await;
        ConnectOutcome::Connected(address)
    }

    /// Make `address` the connected wallet, replacing `previous`.
    async fn adopt(self: &Arc<Self>, previous: Option<String>, address: &str) {
        info!(address = %address, previous = ?previous, "Wallet connected");
        self.state_tx.send_modify(|s| {
            s.status = ConnectionStatus::Connected;
            s.wallet = Some(address.to_string());
            s.is_admin = false;
            s.loading = false;
            s.error = None;
        });
        self.persist(WALLET_ADDRESS_KEY, Some(address));
        self.persist(IS_ADMIN_KEY, Some("false"));

        let change = ConnectionChanged::new(previous, Some(address.to_string()));
        self.dispatch(&change).await;
        self.resolve_admin(address);
    }

    async fn disconnect(&self) {
        let Some(address) = self.wallet() else {
            return;
        };

        let session_id = self.sessions.session_id();
        self.wallet_tracker
            .log_disconnect(&address, session_id.as_deref())
            .await;
        self.tasks().abort_admin();

        let change = ConnectionChanged::new(Some(address.clone()), None);
        self.dispatch(&change).await;

        self.reset(None);
        info!(address = %address, "Wallet disconnected");
    }

    async fn switch_account(self: &Arc<Self>, account: Option<String>) {
        let current = self.wallet();
        match (current, account) {
            (Some(current), Some(next)) if current == next => {
                debug!(address = %current, "Account change to same wallet ignored");
            }
            (Some(current), Some(next)) => {
                info!(from = %current, to = %next, "Wallet account changed");
                let session_id = self.sessions.session_id();
                self.wallet_tracker
                    .log_disconnect(&current, session_id.as_deref())
                    .await;
                self.tasks().abort_admin();
                self.adopt(Some(current), &next).await;
            }
            (None, Some(next)) => {
                self.adopt(None, &next).await;
            }
            (Some(_), None) => {
                self.disconnect().await;
            }
            (None, None) => {}
        }
    }

    /// Resolve the admin flag in the background. A result for an address that
    /// is no longer connected is discarded.
    fn resolve_admin(self: &Arc<Self>, address: &str) {
        let weak = Arc::downgrade(self);
        let address = address.to_string();

        let handle = tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            let (is_admin, failure) = match inner.admin.is_admin(&address).await {
                Ok(is_admin) => (is_admin, None),
                Err(e) => {
                    warn!(address = %address, error = %e, "Admin check failed");
                    (false, Some(format!("Admin check failed: {}", e)))
                }
            };

            let applied = inner.state_tx.send_if_modified(|s| {
                if s.status != ConnectionStatus::Connected || s.wallet.as_deref() != Some(address.as_str()) {
                    return false;
                }
                s.is_admin = is_admin;
                if failure.is_some() {
                    s.error = failure.clone();
                }
                true
            });

            if applied {
                debug!(address = %address, is_admin, "Admin status resolved");
                inner.persist(IS_ADMIN_KEY, Some(if is_admin { "true" } else { "false" }));
            } else {
                debug!(address = %address, "Discarding stale admin result");
            }
        });

        let mut tasks = self.tasks();
        tasks.abort_admin();
        tasks.admin_resolution = Some(handle.abort_handle());
    }
}

/// Owns the wallet connection and its session for one page.
///
/// Dropping the orchestrator stops its background tasks. An account switch in
/// flight completes first; the session manager then ends any active session
/// on a best-effort basis.
pub struct ConnectionOrchestrator {
    inner: Arc<Inner>,
}

impl ConnectionOrchestrator {
    pub fn new(env: Arc<dyn Environment>, services: Services, config: &BeaconConfig) -> Self {
        let tracking = TrackingClient::new(services.events).with_enabled(config.tracking.enabled);
        let sessions = SessionManager::new(services.session_api, tracking.clone(), config.session.clone());
        let pages = PageViewTracker::new(
            tracking.clone(),
            config.tracking.page_view_debounce(),
            sessions.subscribe(),
        );
        let wallet_tracker = WalletTracker::new(tracking.clone(), config.tracking.auto_track_wallet);
        let (state_tx, _) = watch::channel(WalletState::default());
        let (changes_tx, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                env,
                storage: services.storage,
                admin: services.admin,
                tracking,
                sessions,
                wallet_tracker,
                pages,
                deep_link_base: config.wallet.deep_link_base.clone(),
                app_url: config.wallet.app_url.clone(),
                state_tx,
                changes_tx,
                op_lock: tokio::sync::Mutex::new(()),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    /// Current wallet state snapshot.
    pub fn state(&self) -> WalletState {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch wallet state changes.
    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive every connection change after it has been applied.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ConnectionChanged> {
        self.inner.changes_tx.subscribe()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.sessions.session_id()
    }

    pub fn tracking(&self) -> &TrackingClient {
        &self.inner.tracking
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.tasks().mounted
    }

    /// Connect the injected wallet. Never fails; see [`ConnectOutcome`].
    pub async fn connect_wallet(&self) -> ConnectOutcome {
        let _op = self.inner.op_lock.lock().await;
        self.inner.connect().await
    }

    /// Log the disconnect, end the session and clear wallet state.
    pub async fn disconnect_wallet(&self) {
        let _op = self.inner.op_lock.lock().await;
        self.inner.disconnect().await;
    }

    /// Apply a provider account change (`None` when the account went away).
    pub async fn handle_account_change(&self, account: Option<String>) {
        let _op = self.inner.op_lock.lock().await;
        self.inner.switch_account(account).await;
    }

    /// Install the account-change subscription and silently reconnect a
    /// wallet the provider already exposes. Repeat calls are no-ops.
    pub async fn mount(&self) {
        let Some(provider) = self.inner.env.provider() else {
            debug!("Mounted without a wallet provider");
            self.inner.tasks().mounted = true;
            return;
        };

        {
            let mut tasks = self.inner.tasks();
            if tasks.mounted {
                return;
            }
            tasks.mounted = true;

            let mut accounts = provider.account_changes();
            let (stop_tx, mut stop) = watch::channel(());
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let listener_provider = Arc::clone(&provider);
            tokio::spawn(async move {
                loop {
                    let received = tokio::select! {
                        biased;
                        _ = stop.changed() => break,
                        received = accounts.recv() => received,
                    };
                    let account = match received {
                        Ok(account) => account,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed account changes, resyncing");
                            listener_provider.public_key()
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    let _op = inner.op_lock.lock().await;
                    if stop.has_changed().is_err() {
                        break;
                    }
                    inner.switch_account(account).await;
                }
                debug!("Account change listener stopped");
            });
            tasks.listener_stop = Some(stop_tx);
        }

        if let Some(address) = provider.public_key() {
            let _op = self.inner.op_lock.lock().await;
            if self.inner.wallet().is_none() {
                info!(address = %address, "Auto-reconnecting trusted wallet");
                self.inner.adopt(None, &address).await;
            }
        }
    }

    /// Tear down subscriptions and timers and end the session.
    ///
    /// An account switch already in flight is allowed to finish first, so the
    /// session manager is never left mid-transition.
    pub async fn unmount(&self) {
        self.inner.tasks().stop_all();
        self.inner.pages.cancel();
        let _op = self.inner.op_lock.lock().await;
        self.inner.sessions.shutdown().await;
        debug!("Orchestrator unmounted");
    }

    /// Report a page visibility change.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.inner.sessions.set_visibility(visibility);
    }

    /// Report the current route.
    pub fn observe_route(&self, path: &str) {
        self.inner.pages.observe(path);
    }

    /// Follow a router's current-path observable.
    pub fn follow_routes(&self, routes: watch::Receiver<String>) {
        self.inner.pages.follow(routes);
    }

    pub async fn log_course_start(&self, slug: &str) -> TrackResult {
        let session_id = self.session_id();
        self.inner.tracking.log_course_start(slug, session_id.as_deref()).await
    }

    pub async fn log_course_complete(&self, slug: &str) -> TrackResult {
        let session_id = self.session_id();
        self.inner.tracking.log_course_complete(slug, session_id.as_deref()).await
    }
}

impl Drop for ConnectionOrchestrator {
    fn drop(&mut self) {
        self.inner.tasks().stop_all();
        self.inner.pages.cancel();
    }
}
