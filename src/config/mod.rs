//! Configuration module for the bot client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";
/// How long a flash message stays visible.
pub const DEFAULT_FLASH_TIMEOUT_MS: u64 = 5_000;
/// How long the copy acknowledgment stays on the control.
pub const DEFAULT_COPY_ACK_MS: u64 = 2_000;
/// How many alerts the dashboard renders.
pub const DEFAULT_RECENT_ALERTS: usize = 10;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the bot backend
    pub api_base_url: String,
    /// Path to the SQLite file holding the session identity
    pub session_db_path: PathBuf,
    /// Display timeout for flash messages
    pub flash_timeout: Duration,
    /// Revert delay for the copy acknowledgment
    pub copy_ack: Duration,
    /// Number of alerts shown on the dashboard
    pub recent_alerts: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_db_path: PathBuf::from("./data/session.sqlite"),
            flash_timeout: Duration::from_millis(DEFAULT_FLASH_TIMEOUT_MS),
            copy_ack: Duration::from_millis(DEFAULT_COPY_ACK_MS),
            recent_alerts: DEFAULT_RECENT_ALERTS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_base_url = env::var("TVBOT_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let session_db_path = env::var("TVBOT_SESSION_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_db_path);

        let flash_timeout = Duration::from_millis(parse_or(
            "TVBOT_FLASH_TIMEOUT_MS",
            DEFAULT_FLASH_TIMEOUT_MS,
        ));
        let copy_ack = Duration::from_millis(parse_or("TVBOT_COPY_ACK_MS", DEFAULT_COPY_ACK_MS));
        let recent_alerts = parse_or("TVBOT_RECENT_ALERTS", DEFAULT_RECENT_ALERTS);

        let log_level = env::var("TVBOT_LOG_LEVEL").unwrap_or(defaults.log_level);

        Self {
            api_base_url,
            session_db_path,
            flash_timeout,
            copy_ack,
            recent_alerts,
            log_level,
        }
    }
}

/// Parse a numeric variable, keeping the default when it is absent or malformed.
fn parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
