//! logship demo binary
//!
//! Ships a handful of sample records to an ingestion endpoint.

use clap::Parser;
use logship::config::ShipperConfig;
use logship::handler::Handler;
use logship::policy::ErrorHandling;
use logship::types::{LogEntry, LogLevel};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "logship-demo")]
#[command(about = "Ship sample log records to a remote ingestion endpoint")]
#[command(version)]
struct Args {
    /// Account token
    #[arg(short, long, env = "LOGSHIP_TOKEN")]
    token: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint address (host:port)
    #[arg(short, long)]
    address: Option<String>,

    /// Disable TLS
    #[arg(long)]
    no_tls: bool,

    /// Error handling mode: abort, log or ignore
    #[arg(short, long)]
    error_handling: Option<ErrorHandling>,

    /// Seconds to wait for delivery before shutting down
    #[arg(short, long, default_value = "3")]
    wait_secs: u64,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if args.verbose {
            "logship=trace,info"
        } else {
            "logship=info,warn,error"
        })
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) if path.exists() => ShipperConfig::from_file(path)?,
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            ShipperConfig::default()
        }
        None => ShipperConfig::default(),
    };

    // Override config with CLI arguments
    if let Some(token) = args.token {
        config.token = token;
    }
    if let Some(address) = args.address {
        config.address = Some(address);
    }
    if args.no_tls {
        config.use_tls = false;
    }
    if let Some(mode) = args.error_handling {
        config.error_handling = mode;
    }

    config.validate()?;

    if args.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("Shipping to {}", config.resolved_address());
    info!("TLS enabled: {}", config.use_tls);
    info!("Error handling: {}", config.error_handling);

    let handler: Handler<LogEntry> = Handler::new(config)?;

    let samples = [
        (LogLevel::Debug, "Debug Message"),
        (LogLevel::Info, "Info Message"),
        (LogLevel::Warn, "Warn Message"),
        (LogLevel::Error, "Error Message"),
    ];
    for (level, message) in samples {
        let entry = LogEntry::new(level, "logship-demo", message)
            .with_field("demo", true)
            .with_process_metadata();
        if let Err(e) = handler.submit(entry) {
            error!("Failed to submit record: {}", e);
        }
    }

    tokio::time::sleep(Duration::from_secs(args.wait_secs)).await;

    let stats = handler.stats();
    info!(
        "Delivered {} of {} records ({} dial failures)",
        stats.delivered, stats.submitted, stats.dial_failures
    );

    handler.join().await?;
    info!("logship demo stopped");
    Ok(())
}
