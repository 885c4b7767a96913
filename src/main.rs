//! Danger Room server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                  DANGER ROOM                  │
//!                         │                                               │
//!   operator ─────────────┼─▶ control ──▶ registry ──▶ proxy table        │
//!   (POST /~danger/...)   │   (media type) (decode)    (create / swap)    │
//!                         │                                 │             │
//!   client ───────────────┼─▶ http server ──▶ mount lookup ─┘             │
//!                         │                       │                       │
//!                         │                       ▼                       │
//!                         │   director ──▶ upstream client ──────────────┼──▶ origin
//!                         │                       │                       │
//!   client ◀──────────────┼── harness (status, body) ◀── flush writer ◀──┼─── origin
//!                         └───────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use danger_room::config::{load_config, validate_config, DangerRoomConfig};
use danger_room::lifecycle::{spawn_signal_handler, Shutdown};
use danger_room::observability::{logging, metrics};
use danger_room::HttpServer;

#[derive(Parser)]
#[command(name = "danger-room")]
#[command(about = "Reverse proxy that injects response faults", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DangerRoomConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        if let Err(errors) = validate_config(&config) {
            for error in &errors {
                eprintln!("invalid configuration: {}", error);
            }
            return Err("invalid --bind address".into());
        }
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "danger-room starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        control_prefix = %config.control.prefix,
        default_mount = %config.control.default_mount,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
