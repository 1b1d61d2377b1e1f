//! Movie API
//!
//! A JSON HTTP service built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ panic guard ─▶ request id / trace / metrics
//!                       ─▶ timeout / body limit ─▶ CORS
//!                       ─▶ authenticate ─▶ rate limit
//!                       ─▶ [authorize] ─▶ handler ─▶ Storage
//!                                                  └▶ BackgroundTasks ─▶ Notifier
//!
//!     SIGINT/SIGTERM ─▶ ShutdownCoordinator: Running → Draining → Stopped
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use movie_api::config::{self, ApiConfig};
use movie_api::lifecycle::{signals, BackgroundTasks, ShutdownCoordinator};
use movie_api::notify::LogNotifier;
use movie_api::observability::{logging, metrics};
use movie_api::storage::MemoryStorage;
use movie_api::HttpServer;

#[derive(Parser)]
#[command(name = "movie-api", version, about = "JSON API for the movie catalogue", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let config = ApiConfig::default();
            config::validate_config(&config).map_err(config::ConfigError::Validation)?;
            config
        }
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "movie-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = %config.listener.environment,
        limiter_enabled = config.limiter.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = ShutdownCoordinator::from_config(BackgroundTasks::new(), &config.shutdown);
    signals::install(&shutdown);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(
        &config,
        Arc::new(MemoryStorage::new()),
        Arc::new(LogNotifier),
        shutdown,
    );
    if let Err(e) = server.run(listener).await {
        tracing::error!(error = %e, "Shutdown did not complete cleanly");
        return Err(e.into());
    }

    Ok(())
}
