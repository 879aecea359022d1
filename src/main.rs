//! Main entry point for the pug-room service
//!
//! Loads configuration, initializes logging, then runs the lobby until a
//! shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use pug_room::config::{validate_config, AppConfig};
use pug_room::service::{AppState, Transport};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Pug Room - pick-up game lobby with captain drafts
#[derive(Parser)]
#[command(
    name = "pug-room",
    version,
    about = "A chat-driven pick-up game lobby with AFK checks and captain drafts",
    long_about = "Pug Room runs a pick-up game queue in a chat channel. Players add with the \
                 classes they play, inactive players are removed before the draft, and randomly \
                 drawn captains pick balanced teams. Chat arrives over AMQP or the console."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Use stdin/stdout instead of AMQP
    #[arg(long, help = "Read chat from stdin as 'nick: text' and print output")]
    console: bool,

    /// AMQP URL override
    #[arg(long, value_name = "URL", help = "Override AMQP connection URL")]
    amqp_url: Option<String>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health and metrics port")]
    health_port: Option<u16>,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C) signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

fn display_startup_banner(config: &AppConfig, transport: Transport) {
    info!("Pug Room {}", pug_room::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Channel: {}", config.service.channel);
    info!("   Transport: {:?}", transport);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   Teams: {} x {} slots, minimum {} players",
        config.teams.count,
        config.teams.slots_per_team(),
        config.pug.minimum_players
    );
    info!("   Pick order: {}", config.pug.pick_order);
    info!("   Senders: {}", config.dispatch.senders.join(", "));
}

/// Load configuration, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(amqp_url) = &args.amqp_url {
        config.amqp.url = amqp_url.clone();
        config.amqp.enabled = true;
    }
    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }
    if args.console {
        config.amqp.enabled = false;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let transport = if config.amqp.enabled {
        Transport::Amqp
    } else {
        Transport::Console
    };

    display_startup_banner(&config, transport);

    if args.dry_run {
        info!("Dry run completed - configuration is valid");
        return Ok(());
    }

    let mut app_state = match AppState::new(config.clone(), transport).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Pug Room is running, press Ctrl+C to stop");
    wait_for_shutdown_signal().await;

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    Ok(())
}
