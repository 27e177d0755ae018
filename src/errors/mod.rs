//! Error handling module for the bot client.
//!
//! Separates transport failures (which become flash messages or error views)
//! from local failures (storage, clipboard) that never reach the server-error path.

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::FlashMessage;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const HTTP_STATUS: &str = "HTTP_STATUS";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const MALFORMED_BODY: &str = "MALFORMED_BODY";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const CLIPBOARD_ERROR: &str = "CLIPBOARD_ERROR";
    pub const NOT_LOADED: &str = "NOT_LOADED";
    pub const NOT_CONFIRMED: &str = "NOT_CONFIRMED";
}

/// Structured payload a backend may attach to a non-2xx response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPayload {
    pub error: Option<String>,
    pub flash_messages: Vec<FlashMessage>,
}

/// Failure of a single outbound request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No server was reached.
    #[error("network failure: {0}")]
    Network(String),
    /// The server answered with a non-2xx status.
    #[error("server returned {status}")]
    Status {
        status: StatusCode,
        payload: ServerPayload,
    },
    /// A 2xx response whose body could not be understood.
    #[error("malformed response body: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Network(_) => codes::NETWORK_ERROR,
            TransportError::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                codes::NOT_FOUND
            }
            TransportError::Status { .. } => codes::HTTP_STATUS,
            TransportError::Malformed(_) => codes::MALFORMED_BODY,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Server-supplied payload, if the server supplied one.
    pub fn payload(&self) -> Option<&ServerPayload> {
        match self {
            TransportError::Status { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Flash messages a caller should show for this failure: the server's list
    /// verbatim, followed by the server's error text or `fallback`.
    pub fn to_flash_messages(&self, fallback: &str) -> Vec<FlashMessage> {
        let mut messages = Vec::new();
        let mut error_text = None;
        if let Some(payload) = self.payload() {
            messages.extend(payload.flash_messages.iter().cloned());
            error_text = payload.error.clone();
        }
        messages.push(FlashMessage::error(
            error_text.unwrap_or_else(|| fallback.to_string()),
        ));
        messages
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        tracing::debug!("Request failed: {:?}", err);
        if err.is_decode() {
            TransportError::Malformed(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Failure of the local session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Clipboard failures are local-only and never become server-error flashes.
#[derive(Debug, Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Top-level client error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Required input missing; caught before anything is sent.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    /// An action needs a loaded dashboard first.
    #[error("dashboard is not loaded")]
    NotLoaded,
    /// The user declined a destructive action.
    #[error("action cancelled by user")]
    NotConfirmed,
}

impl ClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Transport(err) => err.error_code(),
            ClientError::Validation(_) => codes::VALIDATION_ERROR,
            ClientError::Store(_) => codes::STORAGE_ERROR,
            ClientError::Clipboard(_) => codes::CLIPBOARD_ERROR,
            ClientError::NotLoaded => codes::NOT_LOADED,
            ClientError::NotConfirmed => codes::NOT_CONFIRMED,
        }
    }
}
