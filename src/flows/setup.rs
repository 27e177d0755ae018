//! Setup flow: submit a bot token and delivery target, hand off the new subject.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::wire::SetupResponse;
use crate::api::Transport;
use crate::errors::ClientError;
use crate::flash::FlashQueue;
use crate::models::{BotConfigRequest, FlashMessage};

pub const SETUP_SUCCESS: &str = "Bot configured successfully!";
pub const SETUP_FAILED: &str = "An error occurred while setting up the bot";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupState {
    Idle,
    Submitting,
    Succeeded { subject_id: String },
}

/// Result of one submission. Failures have already been reported as flashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Succeeded { subject_id: String },
    Failed,
}

pub struct SetupFlow {
    transport: Transport,
    flash: FlashQueue,
    state: Mutex<SetupState>,
}

impl SetupFlow {
    pub fn new(transport: Transport, flash: FlashQueue) -> Self {
        Self {
            transport,
            flash,
            state: Mutex::new(SetupState::Idle),
        }
    }

    pub fn state(&self) -> SetupState {
        self.lock().clone()
    }

    /// Submit a configuration request.
    ///
    /// Returns `Err` only for local preconditions (empty token, submission already
    /// in flight); nothing is sent in that case.
    pub async fn submit(&self, request: BotConfigRequest) -> Result<SetupOutcome, ClientError> {
        if request.credential().trim().is_empty() {
            return Err(ClientError::Validation("Bot token is required".to_string()));
        }

        {
            let mut state = self.lock();
            if *state == SetupState::Submitting {
                return Err(ClientError::Validation(
                    "A setup request is already in progress".to_string(),
                ));
            }
            *state = SetupState::Submitting;
        }
        let _in_flight = InFlight { state: &self.state };

        tracing::info!(
            "Submitting bot setup (target: {})",
            request.delivery_target()
        );

        let outcome = match self.transport.post("/setup", &request).await {
            Ok(response) => match response.json::<SetupResponse>() {
                Ok(SetupResponse {
                    subject_id: Some(subject_id),
                    flash_messages,
                }) => {
                    self.flash.extend(
                        flash_messages.unwrap_or_else(|| vec![FlashMessage::success(SETUP_SUCCESS)]),
                    );
                    SetupOutcome::Succeeded { subject_id }
                }
                Ok(SetupResponse { flash_messages, .. }) => {
                    tracing::warn!("Setup response carried no subject id");
                    self.flash.extend(flash_messages.unwrap_or_default());
                    self.flash.push(FlashMessage::error(SETUP_FAILED));
                    SetupOutcome::Failed
                }
                Err(e) => {
                    tracing::warn!("Setup response unreadable: {}", e);
                    self.flash.push(FlashMessage::error(SETUP_FAILED));
                    SetupOutcome::Failed
                }
            },
            Err(e) => {
                tracing::warn!("Setup failed: {}", e);
                self.flash.extend(e.to_flash_messages(SETUP_FAILED));
                SetupOutcome::Failed
            }
        };

        *self.lock() = match &outcome {
            SetupOutcome::Succeeded { subject_id } => {
                tracing::info!("Bot configured as subject {}", subject_id);
                SetupState::Succeeded {
                    subject_id: subject_id.clone(),
                }
            }
            SetupOutcome::Failed => SetupState::Idle,
        };

        Ok(outcome)
    }

    fn lock(&self) -> MutexGuard<'_, SetupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the flow to `Idle` if a submission is dropped before it finishes.
struct InFlight<'a> {
    state: &'a Mutex<SetupState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SetupState::Submitting {
            *state = SetupState::Idle;
        }
    }
}
