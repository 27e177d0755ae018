//! Dashboard view of one configured bot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeliveryTarget;

/// Severity of the authentication banner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    Warning,
    Success,
    Info,
}

impl AuthLevel {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "warning" => AuthLevel::Warning,
            "success" => AuthLevel::Success,
            _ => AuthLevel::Info,
        }
    }
}

/// Authentication banner as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthNotice {
    pub level: AuthLevel,
    pub message: String,
}

/// One alert forwarded (or not) to the chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertRecord {
    /// `None` when the backend sent no usable time.
    pub timestamp: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub payload_summary: String,
}

/// Snapshot of a subject as last fetched from the backend.
///
/// Replaced wholesale on every successful load; never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardState {
    pub subject_id: String,
    pub bot_username: String,
    pub delivery_target: Option<DeliveryTarget>,
    pub authenticated: bool,
    pub auth_command: String,
    pub auth_notice: Option<AuthNotice>,
    pub webhook_url: String,
    /// Ordered most-recent-first.
    pub recent_alerts: Vec<AlertRecord>,
}

impl DashboardState {
    /// The `limit` most recent alerts.
    pub fn latest_alerts(&self, limit: usize) -> &[AlertRecord] {
        let end = limit.min(self.recent_alerts.len());
        &self.recent_alerts[..end]
    }
}
