//! dbpulse Daemon - Collector orchestration and health scoring service
//!
//! The dbpulse daemon provides:
//! - Scheduled, single-flight runs of the 13 metric collectors
//! - Threshold evaluation with per-server exceptions
//! - Periodic consolidation into weighted health scores and transitions
//! - REST API for collector configuration and score queries

use anyhow::Context;
use clap::Parser;
use dbpulse_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// dbpulse Daemon CLI
#[derive(Parser)]
#[command(name = "dbpulsed")]
#[command(about = "dbpulse Daemon - Database fleet health scoring", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DBPULSE_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "DBPULSE_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "DBPULSE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "DBPULSE_LOG_JSON")]
    json: bool,

    /// Do not start collector timers; runs happen on manual trigger only
    #[arg(long)]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", listen))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if cli.no_autostart {
        config.scheduler.autostart = false;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        instances = config.inventory.instances.len(),
        autostart = config.scheduler.autostart,
        "Starting dbpulse daemon"
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
