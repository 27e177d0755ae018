//! TradingView Bot command-line client
//!
//! Connects a Telegram bot to TradingView alerts and shows its dashboard.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tvbot_client::clipboard::{ClipboardFeedback, CopyAck, CopyIndicator, SystemClipboard};
use tvbot_client::config::Config;
use tvbot_client::errors::ClientError;
use tvbot_client::flows::{DashboardView, RotationOutcome, SetupOutcome};
use tvbot_client::models::{BotConfigRequest, DeliveryTarget};
use tvbot_client::render;
use tvbot_client::route::Route;
use tvbot_client::App;

#[derive(Parser)]
#[command(name = "tvbot", about = "TradingView alert bot client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect a Telegram bot and open its dashboard
    Setup {
        /// Bot token from @BotFather
        #[arg(long)]
        token: String,
        /// Where alerts are delivered: personal, group or channel
        #[arg(long, default_value = "personal")]
        target: DeliveryTarget,
    },
    /// Show the dashboard of a configured bot
    Dashboard { subject_id: String },
    /// Open a client location such as /dashboard/<id>
    Open { path: String },
    /// Regenerate the webhook secret
    Rotate {
        subject_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Copy the webhook URL to the clipboard
    Copy { subject_id: String },
    /// Reload the dashboard until the bot is authenticated
    Watch {
        subject_id: String,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        #[arg(long, default_value_t = 60)]
        max_attempts: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    tracing::debug!("Backend: {}", config.api_base_url);
    tracing::debug!("Session store: {:?}", config.session_db_path);

    let app = App::connect(config).await;
    if app.session().is_degraded() {
        eprintln!("warning: session could not be saved; it will be lost when this program exits");
    }

    match run(&app, cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &App, command: Command) -> Result<ExitCode, ClientError> {
    let limit = app.config().recent_alerts;

    match command {
        Command::Setup { token, target } => {
            let outcome = app
                .submit_setup(BotConfigRequest::new(token, target))
                .await?;
            print_flash(app);
            match outcome {
                SetupOutcome::Succeeded { subject_id } => {
                    println!("Dashboard: {}", Route::dashboard(subject_id).path());
                    Ok(show(app, limit))
                }
                SetupOutcome::Failed => Ok(ExitCode::FAILURE),
            }
        }
        Command::Dashboard { subject_id } => {
            app.navigate(&Route::dashboard(subject_id).path()).await;
            print_flash(app);
            Ok(show(app, limit))
        }
        Command::Open { path } => match app.navigate(&path).await {
            Route::Setup => {
                println!("Run `tvbot setup --token <TOKEN>` to connect a bot.");
                Ok(ExitCode::SUCCESS)
            }
            Route::Dashboard { .. } => {
                print_flash(app);
                Ok(show(app, limit))
            }
            Route::NotFound => {
                print!("{}", render::render_not_found("Page Not Found"));
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Rotate { subject_id, yes } => {
            app.navigate(&Route::dashboard(subject_id).path()).await;
            if app.dashboard().current().is_none() {
                print_flash(app);
                return Ok(show(app, limit));
            }
            let confirm = |prompt: &str| yes || ask(prompt);
            let outcome = app.rotate_secret(&confirm).await?;
            print_flash(app);
            match outcome {
                RotationOutcome::Rotated(_) => Ok(show(app, limit)),
                RotationOutcome::Failed => Ok(ExitCode::FAILURE),
            }
        }
        Command::Copy { subject_id } => {
            app.navigate(&Route::dashboard(subject_id).path()).await;
            let feedback = ClipboardFeedback::new(
                Arc::new(SystemClipboard),
                CopyIndicator::new(),
                app.config().copy_ack,
            );
            match app.copy_webhook(&feedback) {
                Ok(true) => {
                    print_flash(app);
                    print!(
                        "{}",
                        render::render_view(&app.view(), limit, feedback.indicator().state())
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Ok(false) => Ok(show(app, limit)),
                Err(e) => {
                    eprintln!("Could not copy to clipboard: {}", e);
                    Ok(show(app, limit))
                }
            }
        }
        Command::Watch {
            subject_id,
            interval_secs,
            max_attempts,
        } => {
            app.navigate(&Route::dashboard(subject_id).path()).await;
            let authenticated = app
                .dashboard()
                .poll_until_authenticated(Duration::from_secs(interval_secs), max_attempts)
                .await;
            print_flash(app);
            let code = show(app, limit);
            if authenticated {
                Ok(code)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn print_flash(app: &App) {
    eprint!("{}", render::render_flash(&app.flash().snapshot()));
}

fn show(app: &App, limit: usize) -> ExitCode {
    let view = app.view();
    print!("{}", render::render_view(&view, limit, CopyAck::Idle));
    match view {
        DashboardView::Loaded(_) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn ask(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
