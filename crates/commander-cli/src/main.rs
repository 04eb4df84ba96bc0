use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod repl;

use commander_core::{
    AuthorizationState, Capabilities, DeliveryOrchestrator, DeliveryOutcome, DeliveryRequest,
    RecentCommands, SessionState,
};
use config::CommanderConfig;
use repl::ReplCommand;

#[derive(Parser)]
#[command(name = "commander")]
#[command(version)]
#[command(about = "Commander: send text commands to the Cursor chat composer")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Check permissions and whether the target is running
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one command to the target
    Send {
        /// The command text
        text: String,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch the target application
    Launch,

    /// Manage OS permissions
    Permissions {
        #[command(subcommand)]
        action: PermissionsAction,
    },

    /// Interactive mode: one command per line
    Repl,
}

#[derive(Subcommand)]
enum PermissionsAction {
    /// Open the settings pane and show instructions, then re-check
    Request {
        #[arg(value_enum)]
        kind: PermissionKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PermissionKind {
    /// Synthesizing keyboard and mouse input
    Accessibility,
    /// Controlling System Events
    Automation,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Status { json } => cmd_status(&cli.config, json).await,
        Commands::Send { text, json } => cmd_send(&cli.config, &text, json).await,
        Commands::Launch => cmd_launch(&cli.config).await,
        Commands::Permissions {
            action: PermissionsAction::Request { kind },
        } => cmd_permissions_request(&cli.config, kind).await,
        Commands::Repl => cmd_repl(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("Commander initialized at {}", config_dir.display());
    println!("Edit {} to adjust the target and timing.", config_path.display());
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = CommanderConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

struct App {
    orchestrator: Arc<DeliveryOrchestrator>,
    history: Arc<RecentCommands>,
}

fn build_app(config_path: &Option<PathBuf>) -> Result<App> {
    let cfg = CommanderConfig::load(config_path)?;
    let caps = Capabilities::native(cfg.scripting.timeout_secs)
        .context("Commander can only drive applications on macOS")?;
    let session = Arc::new(SessionState::new());
    let history = Arc::new(RecentCommands::new(cfg.history.capacity));
    let orchestrator = DeliveryOrchestrator::new(cfg.delivery(), caps, session, history.clone());
    Ok(App {
        orchestrator: Arc::new(orchestrator),
        history,
    })
}

#[derive(Serialize)]
struct StatusReport {
    target: String,
    bundle_id: String,
    running: bool,
    authorization: AuthorizationState,
    status: String,
}

async fn status_report(orchestrator: &DeliveryOrchestrator) -> StatusReport {
    // Checking status should never pop up the OS trust prompt
    let authorization = orchestrator
        .permission_gate()
        .clone()
        .with_prompt(false)
        .refresh()
        .await;
    let running = orchestrator.refresh_running_state().await;
    let target = orchestrator.locator().target();
    StatusReport {
        target: target.display_name.clone(),
        bundle_id: target.bundle_id.clone(),
        running,
        authorization,
        status: orchestrator.session().status(),
    }
}

fn yes_no(flag: bool, yes: &str, no: &str) -> String {
    if flag { yes.to_string() } else { no.to_string() }
}

fn print_status(report: &StatusReport) {
    println!("Target:          {} ({})", report.target, report.bundle_id);
    println!(
        "Running:         {}",
        yes_no(report.running, "yes", "no")
    );
    println!(
        "Input synthesis: {}",
        yes_no(report.authorization.input_synthesis_allowed, "granted", "denied")
    );
    println!(
        "UI scripting:    {}",
        yes_no(report.authorization.ui_scripting_allowed, "granted", "denied")
    );
    if !report.status.is_empty() {
        println!("Status:          {}", report.status);
    }
}

async fn cmd_status(config_path: &Option<PathBuf>, json: bool) -> Result<()> {
    let app = build_app(config_path)?;
    let report = status_report(&app.orchestrator).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_status(&report);
    }
    Ok(())
}

async fn cmd_send(config_path: &Option<PathBuf>, text: &str, json: bool) -> Result<()> {
    let app = build_app(config_path)?;
    let orchestrator = &app.orchestrator;

    orchestrator.refresh_permissions().await;
    orchestrator.refresh_running_state().await;

    let outcome = orchestrator.deliver(&DeliveryRequest::new(text)).await;
    orchestrator.session().shutdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.succeeded {
        println!("{}", outcome.status_message);
    }
    outcome_result(&outcome)
}

/// A failed delivery ends the process with an error and a non-zero status
fn outcome_result(outcome: &DeliveryOutcome) -> Result<()> {
    if !outcome.succeeded {
        anyhow::bail!("{}", outcome.status_message);
    }
    Ok(())
}

/// Returns whether the target is running once the launch settles
async fn launch_and_wait(orchestrator: &DeliveryOrchestrator) -> bool {
    match orchestrator.launch_target().await {
        Ok(attempt) => {
            println!("Launching via {}...", attempt.method);
            match attempt.recheck.await {
                Ok(running) => running,
                Err(e) => {
                    warn!("Launch re-check task failed: {}", e);
                    false
                }
            }
        }
        Err(e) => {
            println!("{}", e.status_message());
            false
        }
    }
}

async fn cmd_launch(config_path: &Option<PathBuf>) -> Result<()> {
    let app = build_app(config_path)?;
    let orchestrator = &app.orchestrator;
    let name = orchestrator.locator().target().display_name.clone();

    if orchestrator.refresh_running_state().await {
        println!("{} is already running", name);
        return Ok(());
    }

    let running = launch_and_wait(orchestrator).await;
    orchestrator.session().shutdown();
    if !running {
        anyhow::bail!("{} is not running yet", name);
    }
    println!("{} is running", name);
    Ok(())
}

async fn cmd_permissions_request(
    config_path: &Option<PathBuf>,
    kind: PermissionKind,
) -> Result<()> {
    let app = build_app(config_path)?;
    let gate = app.orchestrator.permission_gate();

    let recheck = match kind {
        PermissionKind::Accessibility => gate.request_input_synthesis_permission(),
        PermissionKind::Automation => gate.request_ui_scripting_permission(),
    };
    recheck.await.context("Permission re-check task failed")?;

    let authorization = app.orchestrator.session().authorization();
    let granted = match kind {
        PermissionKind::Accessibility => authorization.input_synthesis_allowed,
        PermissionKind::Automation => authorization.ui_scripting_allowed,
    };
    if granted {
        println!("Permission granted");
    } else {
        println!("Permission not granted yet. Restart Commander after enabling it.");
    }
    Ok(())
}

fn print_outcome(outcome: &DeliveryOutcome) {
    println!("{}", outcome.status_message);
}

async fn cmd_repl(config_path: &Option<PathBuf>) -> Result<()> {
    let app = build_app(config_path)?;
    let orchestrator = app.orchestrator.clone();
    let session = orchestrator.session().clone();

    let auth = orchestrator.refresh_permissions().await;
    if !auth.input_synthesis_allowed {
        warn!("Accessibility permission is missing; run `commander permissions request accessibility`");
    }
    orchestrator.refresh_running_state().await;

    let poller = orchestrator.status_poller();
    poller.start();

    // Echo background status changes
    let mut status_rx = session.subscribe_status();
    let shutdown = session.shutdown_token();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = status_rx.borrow_and_update().clone();
                    info!("Status: {}", status);
                }
            }
        }
    });

    println!("{}", repl::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl-C, exiting");
                break;
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            break;
        };

        match repl::parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Send(text) => {
                let outcome = orchestrator.deliver(&DeliveryRequest::new(text)).await;
                print_outcome(&outcome);
            }
            ReplCommand::History => {
                let entries = app.history.entries();
                if entries.is_empty() {
                    println!("No commands yet");
                }
                for (i, entry) in entries.iter().enumerate() {
                    println!(
                        "{:>2}. [{}] {}",
                        i + 1,
                        entry.recorded_at.with_timezone(&chrono::Local).format("%H:%M:%S"),
                        entry.text
                    );
                }
            }
            ReplCommand::Resend(n) => match app.history.get(n - 1) {
                Some(entry) => {
                    let outcome = orchestrator
                        .deliver(&DeliveryRequest::new(entry.text))
                        .await;
                    print_outcome(&outcome);
                }
                None => println!("No history entry {}", n),
            },
            ReplCommand::Launch => {
                if launch_and_wait(&orchestrator).await {
                    println!("{} is running", orchestrator.locator().target().display_name);
                }
            }
            ReplCommand::Status => {
                let report = status_report(&orchestrator).await;
                print_status(&report);
            }
            ReplCommand::Help => println!("{}", repl::HELP),
            ReplCommand::Quit => break,
            ReplCommand::Invalid(message) => println!("{}", message),
        }
    }

    poller.stop();
    session.shutdown();
    let _ = printer.await;
    Ok(())
}
