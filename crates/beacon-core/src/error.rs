//! Error types for beacon-core.

use thiserror::Error;

/// Result type alias using beacon-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for beacon operations
#[derive(Error, Debug)]
pub enum Error {
    // Wallet provider errors
    #[error("No wallet found. Install or open a Solana wallet to continue.")]
    ProviderMissing,

    #[error("Connection request was declined in the wallet. Approve the request to continue.")]
    UserRejected,

    #[error("Wallet connection failed: {0}. Please try again.")]
    Provider(String),

    // Remote API errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    // Local state errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an API error from a non-success response
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}
