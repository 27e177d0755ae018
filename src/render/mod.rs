//! Plain-text rendering of client views for the terminal.

use std::fmt::Write;

use crate::clipboard::CopyAck;
use crate::flash::FlashEntry;
use crate::flows::DashboardView;
use crate::models::{AuthLevel, DashboardState, FlashKind};

/// Drop markup tags from a server-provided banner.
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub fn render_flash(entries: &[FlashEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let tag = match entry.message.kind {
            FlashKind::Success => "ok",
            FlashKind::Error => "error",
        };
        let _ = writeln!(out, "[{}] {}", tag, entry.message.text);
    }
    out
}

pub fn render_dashboard(state: &DashboardState, alert_limit: usize, copy: CopyAck) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Bot: @{}", state.bot_username);
    if let Some(target) = state.delivery_target {
        let _ = writeln!(out, "Alerts go to: {}", target.label());
    }

    match &state.auth_notice {
        Some(notice) => {
            let label = match notice.level {
                AuthLevel::Warning => "!",
                AuthLevel::Success => "ok",
                AuthLevel::Info => "i",
            };
            let _ = writeln!(out, "[{}] {}", label, strip_markup(&notice.message));
        }
        None if state.authenticated => {
            let _ = writeln!(out, "[ok] Bot is authenticated");
        }
        None => {
            let _ = writeln!(out, "[!] Bot is not authenticated yet");
        }
    }
    if !state.authenticated && !state.auth_command.is_empty() {
        let _ = writeln!(out, "    Send this in the chat: {}", state.auth_command);
    }

    let marker = match copy {
        CopyAck::Copied => " (copied)",
        CopyAck::Idle => "",
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "Webhook URL for TradingView:{}", marker);
    let _ = writeln!(out, "  {}", state.webhook_url);
    let _ = writeln!(out);

    let _ = writeln!(out, "Recent alerts:");
    let alerts = state.latest_alerts(alert_limit);
    if alerts.is_empty() {
        let _ = writeln!(out, "  No alerts yet");
    }
    for alert in alerts {
        let _ = writeln!(
            out,
            "  {} {} - {}",
            if alert.delivered { "+" } else { "x" },
            alert
                .timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown time".to_string()),
            alert.payload_summary
        );
    }

    out
}

pub fn render_not_found(message: &str) -> String {
    format!("{}\n\nGo home: /\n", message)
}

pub fn render_view(view: &DashboardView, alert_limit: usize, copy: CopyAck) -> String {
    match view {
        DashboardView::Idle => String::new(),
        DashboardView::Loading { previous: Some(state) } => {
            render_dashboard(state, alert_limit, copy)
        }
        DashboardView::Loading { previous: None } => "Loading...\n".to_string(),
        DashboardView::Loaded(state) => render_dashboard(state, alert_limit, copy),
        DashboardView::NotFound => render_not_found(crate::flows::NOT_FOUND_MESSAGE),
        DashboardView::Errored(message) => render_not_found(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertRecord, AuthNotice, FlashMessage};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn sample() -> DashboardState {
        DashboardState {
            subject_id: "u42".to_string(),
            bot_username: "demo_bot".to_string(),
            delivery_target: None,
            authenticated: false,
            auth_command: "/auth 9f3a".to_string(),
            auth_notice: Some(AuthNotice {
                level: AuthLevel::Warning,
                message: "Send <code>/auth 9f3a</code> to finish".to_string(),
            }),
            webhook_url: "https://bot.example.com/webhook/u42/s".to_string(),
            recent_alerts: (0..3)
                .map(|i| AlertRecord {
                    timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12 - i, 0, 0).single(),
                    delivered: i != 1,
                    payload_summary: format!("alert {}", i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("Send <code>/auth x</code> &amp; wait"),
            "Send /auth x & wait"
        );
    }

    #[test]
    fn test_dashboard_limits_alerts_and_marks_copy() {
        let text = render_dashboard(&sample(), 2, CopyAck::Copied);
        assert!(text.contains("Bot: @demo_bot"));
        assert!(text.contains("[!] Send /auth 9f3a to finish"));
        assert!(text.contains("(copied)"));
        assert!(text.contains("alert 0"));
        assert!(text.contains("alert 1"));
        assert!(!text.contains("alert 2"));
    }

    #[test]
    fn test_alert_without_time() {
        let mut state = sample();
        state.recent_alerts[0].timestamp = None;
        let text = render_dashboard(&state, 1, CopyAck::Idle);
        assert!(text.contains("  + unknown time - alert 0"));
    }

    #[test]
    fn test_views() {
        assert_eq!(
            render_view(&DashboardView::Loading { previous: None }, 5, CopyAck::Idle),
            "Loading...\n"
        );
        assert!(render_view(&DashboardView::NotFound, 5, CopyAck::Idle).starts_with("User not found"));
        let loading = DashboardView::Loading {
            previous: Some(Arc::new(sample())),
        };
        assert!(render_view(&loading, 5, CopyAck::Idle).contains("demo_bot"));
    }

    #[test]
    fn test_flash_lines() {
        let entries = vec![
            FlashEntry {
                id: 0,
                message: FlashMessage::success("Bot @demo verified"),
            },
            FlashEntry {
                id: 1,
                message: FlashMessage::error("Invalid token"),
            },
        ];
        assert_eq!(
            render_flash(&entries),
            "[ok] Bot @demo verified\n[error] Invalid token\n"
        );
    }
}
