//! Application configuration loaded from environment.

use std::net::SocketAddr;

/// Default per-source history capacity.
pub const DEFAULT_MAX_STORE: usize = 500;

/// Application configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `127.0.0.1:3210`).
    pub server_addr: SocketAddr,
    /// Events retained per source before the oldest is evicted.
    pub max_store: usize,
    /// Apply a permissive CORS layer, so page-side bridges can post from any origin.
    pub cors_permissive: bool,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3210".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let max_store = match lookup("MAX_STORE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigLoadError::InvalidMaxStore(raw))?,
            None => DEFAULT_MAX_STORE,
        };

        let cors_permissive = lookup("CORS_PERMISSIVE")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            server_addr,
            max_store,
            cors_permissive,
            log_level,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("Invalid MAX_STORE: {0} (expected a positive integer)")]
    InvalidMaxStore(String),
}
