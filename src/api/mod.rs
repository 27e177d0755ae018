//! Transport client for the bot backend.
//!
//! Wraps every outbound request: attaches the session header and adopts any
//! rotated session identifier before handing the response back to the caller.

pub mod wire;

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::TransportError;
use crate::session::{SessionIdentity, SessionState};

/// Header carrying the session identity in both directions.
pub const SESSION_HEADER: &str = "x-session-id";

/// A decoded 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Decode the body into a typed response.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

/// HTTP transport bound to one session.
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionState>,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionState>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<SessionState>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.request::<()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, TransportError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Issue one request.
    ///
    /// A rotated session header on the response (success or failure) is persisted
    /// and applied before this returns, so a follow-up request already carries it.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let session = self.session.current();

        tracing::debug!("{} {}", method, url);

        let mut builder = self
            .http
            .request(method, &url)
            .header(SESSION_HEADER, session.as_str());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        let rotated = rotated_session(response.headers(), &session);
        if let Some(identity) = rotated {
            self.session.replace(identity).await;
        }

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!("{} returned {}", path, status);
            return Err(TransportError::Status {
                status,
                payload: wire::parse_error_payload(&text),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::Malformed(e.to_string()))?
        };

        Ok(ApiResponse { status, body })
    }
}

/// A session identifier the server issued in place of the one we sent.
fn rotated_session(headers: &HeaderMap, sent: &SessionIdentity) -> Option<SessionIdentity> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != sent.as_str())
        .map(|v| SessionIdentity::from(v.to_string()))
}
