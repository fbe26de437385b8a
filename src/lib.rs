//! casc - Configuration as Code.
//!
//! Applies declarative YAML documents to the live state of a running
//! application. Each top-level key of a document is dispatched to a registered
//! root configurator; configurators describe their attributes so the whole
//! configurator graph can be listed for documentation.

pub mod admin;
pub mod cli;
pub mod config;
pub mod configurator;
pub mod docs;
pub mod engine;
pub mod error;
pub mod host;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::admin::{AdminServer, Metrics, ReloadTrigger, TokenAuthorizer};
use crate::cli::{Cli, Commands, ServeArgs};
use crate::config::hot_reload::{ConfigReloadEvent, ConfigWatcher};
use crate::config::ProcessProperties;
use crate::engine::{ConfigurationEngine, LoadReport};
use crate::host::LiveState;

/// Runs the tool with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level())?;

    let properties = ProcessProperties::from_definitions(&cli.define)?;
    let state = Arc::new(LiveState::new());
    let registry = host::registry(&state).context("Failed to register configurators")?;
    let engine = ConfigurationEngine::new(Arc::new(registry), Arc::new(properties));

    match cli.command {
        Commands::Apply { json } => apply(engine, &state, json),
        Commands::Describe { roots, json } => describe(&engine, roots, json),
        Commands::Serve(args) => serve(engine, args).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

/// Runs one load cycle, as done at application startup, and prints the result.
fn apply(engine: ConfigurationEngine, state: &LiveState, json: bool) -> Result<()> {
    let report = engine.configure().context("Failed to apply configuration")?;
    let snapshot = state.snapshot();

    if json {
        let output = serde_json::json!({ "report": report, "state": snapshot });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&report);
        println!("{}", serde_yaml::to_string(&snapshot)?);
    }

    Ok(())
}

fn print_report(report: &LoadReport) {
    if report.sources.is_empty() {
        println!("# No configuration sources found.");
    }
    for source in &report.sources {
        println!(
            "# {} ({}) sha256:{} roots: {}",
            source.name,
            source.path.display(),
            source.digest,
            source.roots.join(", ")
        );
    }
    println!("# Loaded at {}", report.loaded_at.to_rfc3339());
}

/// Prints the configurator documentation.
fn describe(engine: &ConfigurationEngine, roots: bool, json: bool) -> Result<()> {
    let docs = if roots {
        docs::describe_roots(engine)
    } else {
        docs::describe(engine)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
    } else {
        print!("{}", docs::format_text(&docs));
    }

    Ok(())
}

/// Loads the configuration, then serves the admin endpoint until Ctrl+C.
async fn serve(engine: ConfigurationEngine, args: ServeArgs) -> Result<()> {
    info!("Starting configuration service");

    let metrics = Arc::new(Metrics::new()?);
    let engine = Arc::new(engine.with_metrics(Arc::clone(&metrics)));

    // Startup is fail-fast: a broken configuration never goes live.
    let startup = Arc::clone(&engine);
    let report = tokio::task::spawn_blocking(move || startup.configure())
        .await?
        .context("Initial configuration failed")?;
    info!(sources = ?report.source_names(), "Initial configuration applied");

    if args.admin_token.is_none() {
        warn!("No admin token configured, reload requests will be ignored");
    }

    let trigger = Arc::new(ReloadTrigger::new(
        Arc::clone(&engine),
        Arc::new(TokenAuthorizer::new(args.admin_token)),
    ));
    let server = AdminServer::new(trigger, Some(metrics), args.bind);
    tokio::spawn(async move {
        if let Err(e) = server.start().await {
            error!(error = %e, "Admin server failed");
        }
    });

    let (reload_tx, mut reload_rx) = mpsc::channel(10);
    if args.watch {
        ConfigWatcher::new(Arc::clone(&engine), reload_tx)
            .start()
            .await
            .context("Failed to watch configuration")?;
        info!("Config hot-reload enabled");
    } else {
        drop(reload_tx);
    }

    info!("Configuration service is running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            Some(event) = reload_rx.recv() => {
                match event {
                    ConfigReloadEvent::Reloaded { sources } => {
                        info!(?sources, "Configuration reloaded");
                    }
                    ConfigReloadEvent::Failed { error } => {
                        warn!(%error, "Configuration reload failed, previous configuration kept");
                    }
                }
            }
        }
    }

    info!("Shutting down configuration service");
    Ok(())
}
