//! Injected wallet provider and host environment seams.

use crate::error::Error;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Provider error code for a request the user declined (EIP-1193 / Phantom).
pub const USER_REJECTED_CODE: i64 = 4001;

/// Raw rejection returned by a provider's `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRejection {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderRejection {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Some(USER_REJECTED_CODE), "User rejected the request.")
    }

    /// Map to the user-facing error taxonomy.
    pub fn classify(&self) -> Error {
        if self.code == Some(USER_REJECTED_CODE) {
            return Error::UserRejected;
        }
        let message = self.message.to_lowercase();
        let declined = ["user rejected", "rejected the request", "declined", "cancel"]
            .iter()
            .any(|needle| message.contains(needle));
        if declined {
            Error::UserRejected
        } else {
            Error::Provider(self.message.clone())
        }
    }
}

impl fmt::Display for ProviderRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A browser- or app-injected wallet, used purely as a connection source.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connect and return the public address.
    ///
    /// With `only_if_trusted` the provider must not prompt the user and
    /// rejects unless the site was approved before.
    async fn connect(&self, only_if_trusted: bool) -> Result<String, ProviderRejection>;

    /// Address the provider currently exposes, if already connected.
    fn public_key(&self) -> Option<String>;

    /// Account change notifications: `Some(address)` on switch, `None` when
    /// the account goes away.
    fn account_changes(&self) -> broadcast::Receiver<Option<String>>;
}

/// Host page facts the orchestrator needs.
pub trait Environment: Send + Sync {
    /// The injected provider, if any.
    fn provider(&self) -> Option<Arc<dyn WalletProvider>>;

    /// Running on a phone or tablet form factor.
    fn is_mobile(&self) -> bool {
        false
    }

    /// Already inside the wallet application's embedded browser.
    fn in_wallet_browser(&self) -> bool {
        false
    }

    /// URL currently displayed; falls back to the configured app URL.
    fn current_url(&self) -> Option<String> {
        None
    }

    /// Navigate away to `url`.
    fn open_url(&self, url: &str);
}

/// Build the wallet universal link that reopens `target_url` inside the
/// wallet's in-app browser.
pub fn deep_link(base: &str, target_url: &str) -> String {
    let origin = url::Url::parse(target_url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| target_url.to_string());
    format!(
        "{}/{}?ref={}",
        base.trim_end_matches('/'),
        encode(target_url),
        encode(&origin)
    )
}

fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
