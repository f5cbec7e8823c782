//! exploreHD Daemon - Main entry point
//!
//! Enumerates attached exploreHD cameras, restores their saved settings
//! and keeps the device list in step with hot-plug events.

mod config;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ehd")]
#[command(about = "exploreHD USB camera control and streaming daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ehd.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enumerate once, print devices as JSON and exit
    #[arg(long)]
    list: bool,

    /// Do not watch for devices being plugged or unplugged
    #[arg(long)]
    no_monitor: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("exploreHD daemon v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let config = config::load_config(&args.config)?;
    info!(
        settings = %config.daemon.settings_path.display(),
        poll_ms = config.monitor.poll_interval_ms,
        launcher = %config.stream.launcher,
        "Configuration loaded"
    );

    let state = state::AppState::new(config);

    if args.list {
        // Listing only; saved streams are not restored
        state.registry.enumerate().await?;
        let devices = state.registry.serialize_all().await?;
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    state.load_settings().await?;
    let count = state.registry.enumerate().await?;
    info!(devices = count, "Initial enumeration complete");

    state.spawn_event_logger();
    state.spawn_settings_sync();

    if !args.no_monitor {
        let registry = state.registry.clone();
        tokio::spawn(async move { registry.run().await });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if let Err(e) = state.save_settings().await {
        error!(error = %e, "Failed to save device settings");
    }
    state.registry.stop_all().await?;

    Ok(())
}
