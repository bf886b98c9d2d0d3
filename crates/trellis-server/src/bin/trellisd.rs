//! Trellis server daemon.
//!
//! The `trellisd` binary serves the production-tracking REST API:
//! - Builds the schema registry and store
//! - Serves the HTTP API for records, CSV, and order tracking
//! - Handles graceful shutdown on SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! trellisd
//!
//! # Start on a custom port
//! trellisd --port 8080
//!
//! # Use a configuration file
//! trellisd --config /etc/trellis/trellisd.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trellis_engine::Engine;
use trellis_schema::production_catalog;
use trellis_server::{router, AppState, ServerConfig};
use trellis_store::MemoryStore;

/// Trellis server daemon.
#[derive(Parser, Debug)]
#[command(
    name = "trellisd",
    version,
    about = "Trellis production-tracking server",
    long_about = "Serves the metadata-driven table engine over HTTP:\n\
                  record CRUD, CSV import/export, and cross-stage order tracking."
)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "TRELLIS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, env = "TRELLIS_PORT")]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Per-stage timeout for order tracking, in milliseconds
    #[arg(long, env = "TRELLIS_STAGE_TIMEOUT_MS")]
    stage_timeout_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "TRELLIS_LOG_LEVEL")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    run_server(config).await
}

fn init_logging(args: &Args) {
    let level = if args.verbose { "debug" } else { &args.log_level };

    let filter = EnvFilter::try_new(format!(
        "trellis_server={level},trellis_engine={level},trellis_store={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("Failed to load config file")?
    } else {
        ServerConfig::default()
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(timeout) = args.stage_timeout_ms {
        config.stage_timeout_ms = timeout;
    }

    Ok(config)
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let registry = Arc::new(production_catalog());
    let store = Arc::new(MemoryStore::new(Arc::clone(&registry)));
    let engine = Engine::new(Arc::clone(&registry), store);

    info!("Server configuration:");
    info!("  Listen address: {}", config.socket_addr());
    info!("  Tables: {}", registry.len());
    info!("  Stage timeout: {} ms", config.stage_timeout_ms);

    let addr = config.socket_addr();
    let app = router(AppState { engine, config });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
