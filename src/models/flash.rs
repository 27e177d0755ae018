//! User-facing notice model.

use serde::{Deserialize, Serialize};

/// Presentation tag for a flash message.
///
/// The backend sends free-form `type` strings; anything that is not an error
/// renders as a success notice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

impl From<String> for FlashKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "error" | "danger" => FlashKind::Error,
            _ => FlashKind::Success,
        }
    }
}

/// A notice shown to the user. On the wire this is `{ "message", "type" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashMessage {
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: FlashKind,
}

fn default_kind() -> FlashKind {
    FlashKind::Success
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: FlashKind::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: FlashKind::Error,
        }
    }
}
