//! Wallet connection seams.
//!
//! - **provider**: injected wallet provider, host environment, deep links
//! - **admin**: admin flag resolution
//! - **tracker**: connect/disconnect tracking adapter

mod admin;
mod provider;
mod tracker;

pub use admin::{AdminCheck, AllowList};
pub use provider::{deep_link, Environment, ProviderRejection, WalletProvider, USER_REJECTED_CODE};
pub use tracker::WalletTracker;
