//! Backend response shapes and their normalization.
//!
//! Two dashboard payload layouts have been observed: a flat camelCase body with an
//! `authStatus` banner, and a nested `{ user, alerts }` body. Both are decoded
//! here and normalized into a single [`DashboardState`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::ServerPayload;
use crate::models::{
    AlertRecord, AuthLevel, AuthNotice, DashboardState, DeliveryTarget, FlashMessage,
};

/// Accept identifiers sent either as strings or as numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Summaries may arrive as strings or as the raw alert JSON.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Naive layouts the backend has been seen to send; read as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|t| t.and_utc())
}

/// Alert times: RFC 3339, naive date-times as UTC, or epoch milliseconds.
/// Anything else yields `None` so one odd record cannot fail the dashboard.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

/// Body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
struct ErrorWire {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "flashMessages", alias = "flash_messages")]
    flash_messages: Option<Vec<FlashMessage>>,
}

/// Parse whatever structured error a server attached; unparseable bodies yield
/// an empty payload.
pub fn parse_error_payload(body: &str) -> ServerPayload {
    let wire: ErrorWire = serde_json::from_str(body).unwrap_or_default();
    ServerPayload {
        error: wire.error.filter(|e| !e.trim().is_empty()),
        flash_messages: wire.flash_messages.unwrap_or_default(),
    }
}

/// Body of a successful `POST /setup`.
#[derive(Debug, Deserialize)]
pub struct SetupResponse {
    #[serde(
        default,
        rename = "userId",
        alias = "user_id",
        alias = "subjectId",
        deserialize_with = "lenient_id"
    )]
    pub subject_id: Option<String>,
    #[serde(default, rename = "flashMessages", alias = "flash_messages")]
    pub flash_messages: Option<Vec<FlashMessage>>,
}

/// Body of a successful secret rotation.
#[derive(Debug, Default, Deserialize)]
pub struct RegenerateResponse {
    #[serde(default, rename = "flashMessages", alias = "flash_messages")]
    pub flash_messages: Option<Vec<FlashMessage>>,
}

#[derive(Debug, Deserialize)]
struct AuthStatusWire {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AlertWire {
    #[serde(
        default,
        rename = "createdAt",
        alias = "created_at",
        alias = "timestamp",
        deserialize_with = "lenient_timestamp"
    )]
    timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "sentSuccessfully",
        alias = "sent_successfully",
        alias = "delivered"
    )]
    delivered: bool,
    #[serde(
        default,
        rename = "webhookData",
        alias = "webhook_data",
        alias = "message",
        deserialize_with = "lenient_text"
    )]
    payload_summary: String,
}

impl From<AlertWire> for AlertRecord {
    fn from(wire: AlertWire) -> Self {
        AlertRecord {
            timestamp: wire.timestamp,
            delivered: wire.delivered,
            payload_summary: wire.payload_summary,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NestedUser {
    #[serde(default, alias = "botUsername")]
    bot_username: String,
    #[serde(default, alias = "alertType")]
    alert_type: Option<DeliveryTarget>,
    #[serde(default, alias = "isAuthenticated", alias = "authenticated")]
    is_authenticated: Option<bool>,
    #[serde(default, alias = "authCommand")]
    auth_command: Option<String>,
    #[serde(default, alias = "authStatus")]
    auth_status: Option<AuthStatusWire>,
    #[serde(default, alias = "webhookUrl")]
    webhook_url: String,
}

#[derive(Debug, Deserialize)]
struct NestedDashboard {
    user: NestedUser,
    #[serde(default)]
    alerts: Vec<AlertWire>,
    #[serde(default, rename = "flashMessages", alias = "flash_messages")]
    flash_messages: Option<Vec<FlashMessage>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatDashboard {
    bot_username: String,
    #[serde(default)]
    alert_type: Option<DeliveryTarget>,
    #[serde(default)]
    authenticated: Option<bool>,
    #[serde(default)]
    auth_command: Option<String>,
    #[serde(default)]
    auth_status: Option<AuthStatusWire>,
    #[serde(default)]
    webhook_url: String,
    #[serde(default)]
    recent_alerts: Option<Vec<AlertWire>>,
    #[serde(default)]
    flash_messages: Option<Vec<FlashMessage>>,
}

/// Either observed dashboard body. The nested form is tried first because it is
/// identified by its required `user` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DashboardWire {
    Nested(NestedDashboard),
    Flat(FlatDashboard),
}

/// Fields common to both layouts, before normalization.
struct DashboardParts {
    bot_username: String,
    delivery_target: Option<DeliveryTarget>,
    authenticated: Option<bool>,
    auth_command: Option<String>,
    auth_status: Option<AuthStatusWire>,
    webhook_url: String,
    alerts: Vec<AlertWire>,
    flash_messages: Vec<FlashMessage>,
}

impl From<DashboardWire> for DashboardParts {
    fn from(wire: DashboardWire) -> Self {
        match wire {
            DashboardWire::Nested(n) => DashboardParts {
                bot_username: n.user.bot_username,
                delivery_target: n.user.alert_type,
                authenticated: n.user.is_authenticated,
                auth_command: n.user.auth_command,
                auth_status: n.user.auth_status,
                webhook_url: n.user.webhook_url,
                alerts: n.alerts,
                flash_messages: n.flash_messages.unwrap_or_default(),
            },
            DashboardWire::Flat(f) => DashboardParts {
                bot_username: f.bot_username,
                delivery_target: f.alert_type,
                authenticated: f.authenticated,
                auth_command: f.auth_command,
                auth_status: f.auth_status,
                webhook_url: f.webhook_url,
                alerts: f.recent_alerts.unwrap_or_default(),
                flash_messages: f.flash_messages.unwrap_or_default(),
            },
        }
    }
}

/// Pull the command out of a `<code>...</code>` span in the banner markup.
fn extract_code_span(message: &str) -> Option<String> {
    let start = message.find("<code>")? + "<code>".len();
    let len = message[start..].find("</code>")?;
    let command = message[start..start + len].trim();
    (!command.is_empty()).then(|| command.to_string())
}

/// Decode a dashboard body of either layout.
///
/// Returns the normalized state plus any flash messages the server attached.
pub fn normalize_dashboard(
    subject_id: &str,
    body: Value,
) -> Result<(DashboardState, Vec<FlashMessage>), serde_json::Error> {
    let parts = DashboardParts::from(serde_json::from_value::<DashboardWire>(body)?);

    let auth_notice = parts.auth_status.map(|status| AuthNotice {
        level: AuthLevel::parse(&status.kind),
        message: status.message,
    });

    let authenticated = parts.authenticated.unwrap_or_else(|| {
        auth_notice
            .as_ref()
            .is_some_and(|n| n.level == AuthLevel::Success)
    });

    let auth_command = parts
        .auth_command
        .filter(|c| !c.trim().is_empty())
        .or_else(|| {
            auth_notice
                .as_ref()
                .and_then(|n| extract_code_span(&n.message))
        })
        .unwrap_or_default();

    let mut recent_alerts: Vec<AlertRecord> =
        parts.alerts.into_iter().map(AlertRecord::from).collect();
    recent_alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let state = DashboardState {
        subject_id: subject_id.to_string(),
        bot_username: parts.bot_username.trim_start_matches('@').to_string(),
        delivery_target: parts.delivery_target,
        authenticated,
        auth_command,
        auth_notice,
        webhook_url: parts.webhook_url,
        recent_alerts,
    };

    Ok((state, parts.flash_messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_layout() {
        let body = json!({
            "botUsername": "demo_bot",
            "authStatus": {
                "type": "warning",
                "message": "Send <code>/auth 9f3a</code> to your bot to finish setup"
            },
            "webhookUrl": "https://bot.example.com/webhook/u42/s3cr3t",
            "recentAlerts": [
                {"createdAt": "2024-05-01T10:00:00Z", "sentSuccessfully": true, "webhookData": "older"},
                {"createdAt": "2024-05-01T12:00:00Z", "sentSuccessfully": false, "webhookData": "newer"}
            ],
            "flashMessages": [{"message": "Welcome back", "type": "success"}]
        });

        let (state, flashes) = normalize_dashboard("u42", body).unwrap();
        assert_eq!(state.subject_id, "u42");
        assert_eq!(state.bot_username, "demo_bot");
        assert!(!state.authenticated);
        assert_eq!(state.auth_command, "/auth 9f3a");
        assert_eq!(state.auth_notice.as_ref().unwrap().level, AuthLevel::Warning);
        assert_eq!(state.recent_alerts[0].payload_summary, "newer");
        assert!(!state.recent_alerts[0].delivered);
        assert_eq!(flashes, vec![FlashMessage::success("Welcome back")]);
    }

    #[test]
    fn test_nested_layout() {
        let body = json!({
            "user": {
                "bot_username": "@demo_bot",
                "alert_type": "channel",
                "is_authenticated": true,
                "auth_command": "/start abc",
                "webhook_url": "https://bot.example.com/webhook/7/k"
            },
            "alerts": [
                {"created_at": "2024-05-01T09:00:00Z", "sent_successfully": true,
                 "webhook_data": {"ticker": "BTCUSD", "side": "buy"}}
            ]
        });

        let (state, flashes) = normalize_dashboard("7", body).unwrap();
        assert_eq!(state.bot_username, "demo_bot");
        assert_eq!(state.delivery_target, Some(DeliveryTarget::Channel));
        assert!(state.authenticated);
        assert_eq!(state.auth_command, "/start abc");
        assert!(state.auth_notice.is_none());
        assert!(state.recent_alerts[0].payload_summary.contains("BTCUSD"));
        assert!(flashes.is_empty());
    }

    #[test]
    fn test_success_banner_means_authenticated() {
        let body = json!({
            "botUsername": "demo_bot",
            "authStatus": {"type": "success", "message": "Bot is authenticated"},
            "webhookUrl": "https://x/y"
        });
        let (state, _) = normalize_dashboard("u1", body).unwrap();
        assert!(state.authenticated);
        assert!(state.recent_alerts.is_empty());
        assert_eq!(state.auth_command, "");
    }

    #[test]
    fn test_odd_alert_times_keep_dashboard() {
        let body = json!({
            "botUsername": "demo_bot",
            "webhookUrl": "https://bot.example.com/webhook/u42/s",
            "authCommand": "/auth 9f3a",
            "recentAlerts": [
                {"createdAt": "2024-05-01T10:00:00Z", "webhookData": "zoned"},
                {"createdAt": "2024-05-01 11:00:00", "webhookData": "naive"},
                {"createdAt": "yesterday", "webhookData": "garbled"},
                {"webhookData": "missing"},
                {"createdAt": 1714564800000_i64, "webhookData": "millis"}
            ]
        });

        let (state, _) = normalize_dashboard("u42", body).unwrap();
        assert_eq!(state.webhook_url, "https://bot.example.com/webhook/u42/s");
        assert_eq!(state.auth_command, "/auth 9f3a");
        assert_eq!(state.recent_alerts.len(), 5);

        let order: Vec<&str> = state
            .recent_alerts
            .iter()
            .map(|a| a.payload_summary.as_str())
            .collect();
        assert_eq!(order[..3], ["millis", "naive", "zoned"]);
        assert!(state.recent_alerts[3..].iter().all(|a| a.timestamp.is_none()));

        let naive = &state.recent_alerts[1];
        assert_eq!(
            naive.timestamp,
            DateTime::parse_from_rfc3339("2024-05-01T11:00:00Z")
                .ok()
                .map(|t| t.with_timezone(&Utc))
        );
    }

    #[test]
    fn test_unrecognized_body_is_error() {
        assert!(normalize_dashboard("u1", json!({"unexpected": true})).is_err());
        assert!(normalize_dashboard("u1", json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_setup_response_id_aliases() {
        let r: SetupResponse = serde_json::from_value(json!({"userId": "u42"})).unwrap();
        assert_eq!(r.subject_id.as_deref(), Some("u42"));
        let r: SetupResponse = serde_json::from_value(json!({"user_id": 42})).unwrap();
        assert_eq!(r.subject_id.as_deref(), Some("42"));
        let r: SetupResponse = serde_json::from_value(json!({"flashMessages": null})).unwrap();
        assert!(r.subject_id.is_none());
        assert!(r.flash_messages.is_none());
    }

    #[test]
    fn test_error_payload_parsing() {
        let payload = parse_error_payload(
            r#"{"error":"Invalid token","flashMessages":[{"message":"Checked","type":"success"}]}"#,
        );
        assert_eq!(payload.error.as_deref(), Some("Invalid token"));
        assert_eq!(payload.flash_messages.len(), 1);

        assert_eq!(parse_error_payload("<html>502</html>"), ServerPayload::default());
        assert_eq!(parse_error_payload(r#"{"error":"  "}"#).error, None);
    }
}
