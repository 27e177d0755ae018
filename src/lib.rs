//! TradingView Bot client
//!
//! Session handling, setup, dashboard and secret-rotation flows for the alert
//! bot backend, with a flash queue and clipboard feedback for the front end.

pub mod api;
pub mod clipboard;
pub mod config;
pub mod db;
pub mod errors;
pub mod flash;
pub mod flows;
pub mod models;
pub mod render;
pub mod route;
pub mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api::Transport;
use clipboard::ClipboardFeedback;
use config::Config;
use db::SqliteSessionStore;
use errors::{ClientError, ClipboardError};
use flash::FlashQueue;
use flows::{
    Confirm, DashboardFlow, DashboardView, RotationOutcome, SecretRotation, SetupFlow,
    SetupOutcome,
};
use models::BotConfigRequest;
use route::Route;
use session::SessionState;

/// Application state shared by every flow.
pub struct App {
    config: Arc<Config>,
    transport: Transport,
    flash: FlashQueue,
    setup: SetupFlow,
    dashboard: Arc<DashboardFlow>,
    rotation: SecretRotation,
    route: Mutex<Route>,
}

impl App {
    /// Open the durable session store and build the client.
    ///
    /// If the store cannot be opened the client still starts, with a degraded
    /// session that will not survive a restart.
    pub async fn connect(config: Config) -> Self {
        let session = match db::init_database(&config.session_db_path).await {
            Ok(pool) => SessionState::get_or_create(Arc::new(SqliteSessionStore::new(pool))).await,
            Err(e) => {
                tracing::warn!(
                    "Cannot open session store {:?}: {}",
                    config.session_db_path,
                    e
                );
                SessionState::ephemeral()
            }
        };
        Self::with_session(config, Arc::new(session))
    }

    pub fn with_session(config: Config, session: Arc<SessionState>) -> Self {
        let transport = Transport::new(config.api_base_url.clone(), session);
        let flash = FlashQueue::new(config.flash_timeout);
        let dashboard = Arc::new(DashboardFlow::new(transport.clone(), flash.clone()));

        Self {
            setup: SetupFlow::new(transport.clone(), flash.clone()),
            rotation: SecretRotation::new(transport.clone(), flash.clone(), dashboard.clone()),
            config: Arc::new(config),
            transport,
            flash,
            dashboard,
            route: Mutex::new(Route::Setup),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.transport.session()
    }

    pub fn flash(&self) -> &FlashQueue {
        &self.flash
    }

    pub fn setup(&self) -> &SetupFlow {
        &self.setup
    }

    pub fn dashboard(&self) -> &Arc<DashboardFlow> {
        &self.dashboard
    }

    pub fn route(&self) -> Route {
        self.lock_route().clone()
    }

    /// Move to `location`, loading the dashboard when the route names a subject.
    pub async fn navigate(&self, location: &str) -> Route {
        let route = Route::parse(location);
        *self.lock_route() = route.clone();
        tracing::debug!("Navigated to {}", route.path());

        if let Route::Dashboard { subject_id } = &route {
            self.dashboard.load(subject_id).await;
        }
        route
    }

    /// Submit the setup form; on success the location becomes the new
    /// subject's dashboard and that dashboard is loaded.
    pub async fn submit_setup(
        &self,
        request: BotConfigRequest,
    ) -> Result<SetupOutcome, ClientError> {
        let outcome = self.setup.submit(request).await?;
        if let SetupOutcome::Succeeded { subject_id } = &outcome {
            self.navigate(&Route::dashboard(subject_id.as_str()).path())
                .await;
        }
        Ok(outcome)
    }

    pub async fn rotate_secret(&self, confirm: &dyn Confirm) -> Result<RotationOutcome, ClientError> {
        self.rotation.rotate(confirm).await
    }

    /// Copy the loaded webhook URL. Returns `false` when there is nothing to copy.
    pub fn copy_webhook(&self, feedback: &ClipboardFeedback) -> Result<bool, ClipboardError> {
        match self.dashboard.current() {
            Some(state) if !state.webhook_url.is_empty() => {
                feedback.copy(&state.webhook_url)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn view(&self) -> DashboardView {
        self.dashboard.view()
    }

    fn lock_route(&self) -> MutexGuard<'_, Route> {
        self.route.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
