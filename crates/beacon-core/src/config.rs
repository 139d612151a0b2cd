//! Configuration management for beacon.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (BEACON_*)
//! 2. Config file (~/.beacon/config.toml, or BEACON_CONFIG)
//! 3. Default values

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Ingestion API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Tracking settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Wallet connection settings
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Local key-value storage
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the session/tracking API
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Heartbeat interval while a session is active
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Extra attempts made when ending a session fails
    #[serde(default = "default_end_retry_attempts")]
    pub end_retry_attempts: u32,

    /// Initial wait between end attempts, doubled each retry
    #[serde(default = "default_end_retry_backoff_ms")]
    pub end_retry_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Send tracking events at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period before a route change is reported
    #[serde(default = "default_page_view_debounce_ms")]
    pub page_view_debounce_ms: u64,

    /// Log wallet_connect automatically when a wallet address appears
    #[serde(default = "default_true")]
    pub auto_track_wallet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Addresses granted the admin flag
    #[serde(default)]
    pub admin_wallets: Vec<String>,

    /// Wallet app universal link used to open the site in the in-app browser
    #[serde(default = "default_deep_link_base")]
    pub deep_link_base: String,

    /// Public URL of the application
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File backing the local key-value store
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_api_url() -> String {
    "http://localhost:4010".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_end_retry_attempts() -> u32 {
    2
}

fn default_end_retry_backoff_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_page_view_debounce_ms() -> u64 {
    1_000
}

fn default_deep_link_base() -> String {
    "https://phantom.app/ul/browse".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".beacon")
}

fn default_storage_path() -> PathBuf {
    default_data_dir().join("storage.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            end_retry_attempts: default_end_retry_attempts(),
            end_retry_backoff_ms: default_end_retry_backoff_ms(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_view_debounce_ms: default_page_view_debounce_ms(),
            auto_track_wallet: true,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            admin_wallets: Vec::new(),
            deep_link_base: default_deep_link_base(),
            app_url: default_app_url(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl SessionConfig {
    /// Never zero; a zero interval cannot drive a ticker.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn end_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.end_retry_backoff_ms)
    }
}

impl TrackingConfig {
    pub fn page_view_debounce(&self) -> Duration {
        Duration::from_millis(self.page_view_debounce_ms)
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BeaconConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the lifecycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session.heartbeat_interval_ms == 0 {
            return Err(Error::Config("session.heartbeat_interval_ms must be greater than 0".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BEACON_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Apply `BEACON_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BEACON_API_URL") {
            self.api.url = url;
        }
        if let Some(ms) = lookup("BEACON_HEARTBEAT_MS") {
            self.session.heartbeat_interval_ms = parse_env("BEACON_HEARTBEAT_MS", &ms)?;
        }
        if let Some(ms) = lookup("BEACON_DEBOUNCE_MS") {
            self.tracking.page_view_debounce_ms = parse_env("BEACON_DEBOUNCE_MS", &ms)?;
        }
        if let Some(enabled) = lookup("BEACON_TRACKING_ENABLED") {
            self.tracking.enabled = parse_env("BEACON_TRACKING_ENABLED", &enabled)?;
        }
        if let Some(wallets) = lookup("BEACON_ADMIN_WALLETS") {
            self.wallet.admin_wallets = wallets
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(path) = lookup("BEACON_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        self.validate()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BeaconConfig::default();

        assert_eq!(config.session.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.tracking.page_view_debounce(), Duration::from_secs(1));
        assert!(config.tracking.enabled);
        assert!(config.tracking.auto_track_wallet);
        assert!(config.wallet.admin_wallets.is_empty());
        assert!(config.storage.path.ends_with("storage.json"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: BeaconConfig = toml::from_str(
            r#"
            [wallet]
            admin_wallets = ["Wa11et1"]

            [session]
            heartbeat_interval_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.wallet.admin_wallets, vec!["Wa11et1".to_string()]);
        assert_eq!(config.session.heartbeat_interval_ms, 5000);
        assert_eq!(config.session.end_retry_attempts, 2);
        assert_eq!(config.api.url, "http://localhost:4010");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = BeaconConfig::load_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, BeaconConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = BeaconConfig::default();
        config.api.url = "http://example.test".into();
        config.save(&path).unwrap();

        let loaded = BeaconConfig::load_file(&path).unwrap();
        assert_eq!(loaded.api.url, "http://example.test");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BEACON_API_URL", "http://api.test"),
            ("BEACON_HEARTBEAT_MS", "1500"),
            ("BEACON_ADMIN_WALLETS", "Wa11et1, Wa11et2,,"),
            ("BEACON_TRACKING_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = BeaconConfig::default();
        config
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api.url, "http://api.test");
        assert_eq!(config.session.heartbeat_interval_ms, 1500);
        assert_eq!(config.wallet.admin_wallets, vec!["Wa11et1", "Wa11et2"]);
        assert!(!config.tracking.enabled);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = BeaconConfig::default();
        let err = config
            .apply_env(|k| (k == "BEACON_HEARTBEAT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_heartbeat_from_env_rejected() {
        let mut config = BeaconConfig::default();
        let err = config
            .apply_env(|k| (k == "BEACON_HEARTBEAT_MS").then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("heartbeat_interval_ms")));
    }

    #[test]
    fn test_zero_heartbeat_in_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nheartbeat_interval_ms = 0\n").unwrap();

        let err = BeaconConfig::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_heartbeat_interval_never_zero() {
        let config = SessionConfig {
            heartbeat_interval_ms: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(1));
    }
}
