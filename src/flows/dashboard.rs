//! Dashboard flow: fetch and hold the current view of one subject.
//!
//! Every fetch takes a generation number; a response is applied only if no
//! newer fetch has started since, so a slow stale response cannot overwrite
//! fresher state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::api::wire::normalize_dashboard;
use crate::api::Transport;
use crate::errors::TransportError;
use crate::flash::FlashQueue;
use crate::models::{DashboardState, FlashMessage};

pub const NOT_FOUND_MESSAGE: &str = "User not found";
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    Idle,
    /// A fetch is in flight. `previous` is a complete earlier snapshot that may
    /// stay on screen meanwhile, never merged with the incoming one.
    Loading {
        previous: Option<Arc<DashboardState>>,
    },
    Loaded(Arc<DashboardState>),
    NotFound,
    Errored(String),
}

impl DashboardView {
    pub fn loaded(&self) -> Option<&Arc<DashboardState>> {
        match self {
            DashboardView::Loaded(state) => Some(state),
            _ => None,
        }
    }
}

/// Identifies one fetch so its response can be matched to the latest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    subject_id: String,
}

impl LoadTicket {
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }
}

/// What a fetch produced, before it is applied.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(DashboardState, Vec<FlashMessage>),
    NotFound,
    Errored(String),
}

struct Inner {
    generation: u64,
    subject_id: Option<String>,
    view: DashboardView,
}

pub struct DashboardFlow {
    transport: Transport,
    flash: FlashQueue,
    inner: Mutex<Inner>,
}

impl DashboardFlow {
    pub fn new(transport: Transport, flash: FlashQueue) -> Self {
        Self {
            transport,
            flash,
            inner: Mutex::new(Inner {
                generation: 0,
                subject_id: None,
                view: DashboardView::Idle,
            }),
        }
    }

    pub fn view(&self) -> DashboardView {
        self.lock().view.clone()
    }

    /// The loaded snapshot, if the flow is in `Loaded`.
    pub fn current(&self) -> Option<Arc<DashboardState>> {
        self.lock().view.loaded().cloned()
    }

    pub fn subject_id(&self) -> Option<String> {
        self.lock().subject_id.clone()
    }

    /// Fetch `subject_id` and apply the result.
    pub async fn load(&self, subject_id: &str) -> DashboardView {
        let ticket = self.begin(subject_id, true);
        self.run(ticket).await
    }

    /// Reload the current subject, discarding the on-screen snapshot: after a
    /// secret rotation its webhook URL is no longer valid.
    pub async fn reload_discarding_current(&self) -> DashboardView {
        let Some(subject_id) = self.subject_id() else {
            return self.view();
        };
        let ticket = self.begin(&subject_id, false);
        self.run(ticket).await
    }

    /// Reload until the bot reports authenticated or `max_attempts` fetches
    /// have been made. Returns whether authentication was observed.
    pub async fn poll_until_authenticated(&self, interval: Duration, max_attempts: u32) -> bool {
        let Some(subject_id) = self.subject_id() else {
            return false;
        };

        for attempt in 1..=max_attempts {
            match self.load(&subject_id).await {
                DashboardView::Loaded(state) if state.authenticated => {
                    tracing::info!("Subject {} authenticated after {} checks", subject_id, attempt);
                    return true;
                }
                DashboardView::Loaded(_) => {}
                _ => return false,
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        false
    }

    /// Enter `Loading` for `subject_id` and hand out the ticket for this fetch.
    pub fn begin(&self, subject_id: &str, keep_previous: bool) -> LoadTicket {
        let mut inner = self.lock();
        inner.generation += 1;

        let same_subject = inner.subject_id.as_deref() == Some(subject_id);
        let previous = match &inner.view {
            DashboardView::Loaded(state) if keep_previous && same_subject => Some(state.clone()),
            DashboardView::Loading { previous } if keep_previous && same_subject => {
                previous.clone()
            }
            _ => None,
        };

        inner.subject_id = Some(subject_id.to_string());
        inner.view = DashboardView::Loading { previous };

        LoadTicket {
            generation: inner.generation,
            subject_id: subject_id.to_string(),
        }
    }

    /// Apply a finished fetch. Returns `false` if a newer fetch superseded it.
    pub fn apply(&self, ticket: &LoadTicket, outcome: LoadOutcome) -> bool {
        let flashes = {
            let mut inner = self.lock();
            if inner.generation != ticket.generation {
                tracing::debug!(
                    "Dropping stale dashboard response (generation {} < {})",
                    ticket.generation,
                    inner.generation
                );
                return false;
            }

            match outcome {
                LoadOutcome::Loaded(state, flashes) => {
                    inner.view = DashboardView::Loaded(Arc::new(state));
                    flashes
                }
                LoadOutcome::NotFound => {
                    inner.view = DashboardView::NotFound;
                    Vec::new()
                }
                LoadOutcome::Errored(message) => {
                    inner.view = DashboardView::Errored(message);
                    Vec::new()
                }
            }
        };

        self.flash.extend(flashes);
        true
    }

    async fn run(&self, ticket: LoadTicket) -> DashboardView {
        let outcome = self.fetch(ticket.subject_id()).await;
        self.apply(&ticket, outcome);
        self.view()
    }

    async fn fetch(&self, subject_id: &str) -> LoadOutcome {
        let path = format!("/dashboard/{}", subject_id);
        match self.transport.get(&path).await {
            Ok(response) => match normalize_dashboard(subject_id, response.body) {
                Ok((state, flashes)) => LoadOutcome::Loaded(state, flashes),
                Err(e) => {
                    tracing::warn!("Dashboard body for {} not understood: {}", subject_id, e);
                    LoadOutcome::Errored(GENERIC_ERROR_MESSAGE.to_string())
                }
            },
            Err(e) if e.is_not_found() => {
                tracing::info!("Subject {} not found", subject_id);
                LoadOutcome::NotFound
            }
            Err(e) => {
                log_failure(subject_id, &e);
                LoadOutcome::Errored(GENERIC_ERROR_MESSAGE.to_string())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_failure(subject_id: &str, err: &TransportError) {
    tracing::warn!(
        "Dashboard fetch for {} failed ({}): {}",
        subject_id,
        err.error_code(),
        err
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    fn flow() -> (DashboardFlow, FlashQueue) {
        let transport = Transport::new(
            "http://127.0.0.1:9",
            Arc::new(SessionState::ephemeral()),
        );
        let flash = FlashQueue::new(Duration::from_secs(5));
        (DashboardFlow::new(transport, flash.clone()), flash)
    }

    fn state(subject_id: &str, webhook_url: &str) -> DashboardState {
        DashboardState {
            subject_id: subject_id.to_string(),
            bot_username: "demo_bot".to_string(),
            delivery_target: None,
            authenticated: false,
            auth_command: "/auth x".to_string(),
            auth_notice: None,
            webhook_url: webhook_url.to_string(),
            recent_alerts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let (flow, flash) = flow();

        let slow = flow.begin("u42", true);
        let fast = flow.begin("u42", true);

        assert!(flow.apply(
            &fast,
            LoadOutcome::Loaded(state("u42", "https://x/new"), vec![])
        ));
        assert!(!flow.apply(
            &slow,
            LoadOutcome::Loaded(
                state("u42", "https://x/old"),
                vec![FlashMessage::success("stale")]
            )
        ));

        assert_eq!(flow.current().unwrap().webhook_url, "https://x/new");
        assert!(flash.is_empty());
    }

    #[tokio::test]
    async fn test_loading_keeps_previous_only_for_same_subject() {
        let (flow, _) = flow();
        let ticket = flow.begin("u1", true);
        flow.apply(&ticket, LoadOutcome::Loaded(state("u1", "https://x/1"), vec![]));

        flow.begin("u1", true);
        match flow.view() {
            DashboardView::Loading { previous: Some(prev) } => {
                assert_eq!(prev.webhook_url, "https://x/1")
            }
            other => panic!("unexpected view {:?}", other),
        }
        assert!(flow.current().is_none());

        flow.begin("u2", true);
        assert_eq!(flow.view(), DashboardView::Loading { previous: None });
    }

    #[tokio::test]
    async fn test_discarding_reload_hides_previous() {
        let (flow, _) = flow();
        let ticket = flow.begin("u1", true);
        flow.apply(&ticket, LoadOutcome::Loaded(state("u1", "https://x/1"), vec![]));

        flow.begin("u1", false);
        assert_eq!(flow.view(), DashboardView::Loading { previous: None });
    }

    #[tokio::test]
    async fn test_not_found_enqueues_nothing() {
        let (flow, flash) = flow();
        let ticket = flow.begin("ghost", true);
        flow.apply(&ticket, LoadOutcome::NotFound);
        assert_eq!(flow.view(), DashboardView::NotFound);
        assert!(flash.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_errored() {
        let (flow, flash) = flow();
        let view = flow.load("u1").await;
        assert_eq!(view, DashboardView::Errored(GENERIC_ERROR_MESSAGE.to_string()));
        assert!(flash.is_empty());
    }
}
