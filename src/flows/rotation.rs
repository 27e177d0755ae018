//! Secret rotation: invalidate the webhook secret and reload the dashboard.

use std::sync::Arc;

use crate::api::wire::RegenerateResponse;
use crate::api::Transport;
use crate::errors::ClientError;
use crate::flash::FlashQueue;
use crate::models::FlashMessage;

use super::{DashboardFlow, DashboardView};

pub const ROTATION_PROMPT: &str =
    "Regenerate the secret key? The current webhook URL will stop working.";
pub const ROTATION_SUCCESS: &str = "Secret key regenerated successfully!";
pub const ROTATION_FAILED: &str = "Failed to regenerate secret key";

/// Asks the user to approve a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The secret changed; carries the dashboard view after the forced reload.
    Rotated(DashboardView),
    /// The backend refused or was unreachable. The dashboard is untouched.
    Failed,
}

pub struct SecretRotation {
    transport: Transport,
    flash: FlashQueue,
    dashboard: Arc<DashboardFlow>,
}

impl SecretRotation {
    pub fn new(transport: Transport, flash: FlashQueue, dashboard: Arc<DashboardFlow>) -> Self {
        Self {
            transport,
            flash,
            dashboard,
        }
    }

    /// Rotate the secret of the loaded subject.
    ///
    /// `Err` means nothing was sent: no dashboard is loaded or the user declined.
    pub async fn rotate(&self, confirm: &dyn Confirm) -> Result<RotationOutcome, ClientError> {
        let Some(current) = self.dashboard.current() else {
            return Err(ClientError::NotLoaded);
        };

        if !confirm.confirm(ROTATION_PROMPT) {
            tracing::info!("Secret rotation for {} declined", current.subject_id);
            return Err(ClientError::NotConfirmed);
        }

        let path = format!("/regenerate/{}", current.subject_id);
        match self.transport.get(&path).await {
            Ok(response) => {
                let body: RegenerateResponse = response.json().unwrap_or_default();
                self.flash.extend(
                    body.flash_messages
                        .unwrap_or_else(|| vec![FlashMessage::success(ROTATION_SUCCESS)]),
                );
                tracing::info!("Secret rotated for {}", current.subject_id);
                let view = self.dashboard.reload_discarding_current().await;
                Ok(RotationOutcome::Rotated(view))
            }
            Err(e) => {
                tracing::warn!("Secret rotation for {} failed: {}", current.subject_id, e);
                self.flash.extend(e.to_flash_messages(ROTATION_FAILED));
                Ok(RotationOutcome::Failed)
            }
        }
    }
}
