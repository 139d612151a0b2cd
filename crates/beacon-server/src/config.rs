//! Server configuration.

use std::net::SocketAddr;

/// Default listen address; matches the client's default API URL.
pub const DEFAULT_ADDR: &str = "127.0.0.1:4010";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub addr: SocketAddr,
    /// Maximum number of tracking events kept in memory
    pub max_events: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 4010)),
            max_events: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// - `BEACON_SERVER_ADDR`: listen address (default `127.0.0.1:4010`)
    /// - `BEACON_SERVER_MAX_EVENTS`: in-memory event cap (default 10000)
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("BEACON_SERVER_ADDR") {
            config.addr = addr
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid BEACON_SERVER_ADDR '{}': {}", addr, e))?;
        }

        if let Some(max) = lookup("BEACON_SERVER_MAX_EVENTS") {
            config.max_events = max
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid BEACON_SERVER_MAX_EVENTS '{}': {}", max, e))?;
            if config.max_events == 0 {
                anyhow::bail!("BEACON_SERVER_MAX_EVENTS must be at least 1");
            }
        }

        Ok(config)
    }
}
