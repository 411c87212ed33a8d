use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use wabridge::DEFAULT_VERSION_URL;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub session_root: PathBuf,
    pub bridge_gateway_url: String,
    pub protocol_version_url: String,
    pub pairing_profile: String,
    pub pairing_code_delay: Duration,
    pub handoff_flush_delay: Duration,
    pub max_reconnects: u32,
    pub reconnect_backoff: Duration,
    pub response_timeout: Duration,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: parse_var("PORT", 8000)?,
            session_root: env::var("SESSION_ROOT")
                .unwrap_or_else(|_| "./sessions".to_string())
                .into(),
            bridge_gateway_url: env::var("BRIDGE_GATEWAY_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:7100/connect".to_string()),
            protocol_version_url: env::var("PROTOCOL_VERSION_URL")
                .unwrap_or_else(|_| DEFAULT_VERSION_URL.to_string()),
            pairing_profile: env::var("PAIRING_PROFILE").unwrap_or_else(|_| "knight".to_string()),
            pairing_code_delay: Duration::from_millis(parse_var("PAIRING_CODE_DELAY_MS", 2000)?),
            handoff_flush_delay: Duration::from_millis(parse_var("HANDOFF_FLUSH_DELAY_MS", 1000)?),
            max_reconnects: parse_var("MAX_RECONNECTS", 10)?,
            reconnect_backoff: Duration::from_millis(parse_var("RECONNECT_BACKOFF_MS", 500)?),
            response_timeout: Duration::from_secs(parse_var("RESPONSE_TIMEOUT_SECS", 60)?),
            rate_limit_per_second: parse_var("RATE_LIMIT_PER_SECOND", 2)?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", 5)?,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
