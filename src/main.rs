//! Prediction proxy (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                  PREDICTION PROXY                     │
//!                 │                                                       │
//!  Client ───────▶│  http server ──▶ validation ──▶ failure tally ──┐      │
//!                 │  (request id,                    tripped?       │      │
//!                 │   rate limit,                    │ yes          │ no   │
//!                 │   body limit)                    ▼              ▼      │
//!                 │                           degraded answer   ml client ─┼──▶ ML service
//!                 │                                                 │      │
//!  Client ◀───────│  envelope ◀──── normalize / scale ◀─────────────┘      │
//!                 │                                                       │
//!                 │  config (TOML + env, hot reload) · tracing · metrics   │
//!                 │  admin API (bearer auth) · graceful shutdown           │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use prediction_proxy::config::loader::load_or_default;
use prediction_proxy::config::watcher::ConfigWatcher;
use prediction_proxy::lifecycle::{shutdown_on_signal, Shutdown};
use prediction_proxy::observability::{logging, metrics};
use prediction_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "prediction-proxy", version, about = "Football match prediction proxy")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not reload the configuration file when it changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    logging::init_tracing(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "prediction-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        ml_service = %config.upstream.base_url,
        failure_threshold = config.breaker.failure_threshold,
        degraded_mode = ?config.breaker.degraded_mode,
        probability_scale = ?config.predictions.probability_scale,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match args.config.as_deref() {
        Some(path) if !args.no_watch => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
