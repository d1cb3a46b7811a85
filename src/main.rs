//! RTB bidder (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────────────────────────────────────────────┐
//!                 │                         BIDDER                              │
//!                 │                                                             │
//!  Exchange ──────┼─▶ http::server ──▶ routing::Router ──▶ receiver::*         │
//!  request        │   (axum, layers)   (path × method)     (bid / impression  │
//!                 │                                         / click / match)   │
//!                 │                                              │             │
//!                 │                                              ▼             │
//!                 │                              interceptor::InterceptorController
//!                 │                              (ordered chain of policies)   │
//!                 │                                              │             │
//!  Exchange ◀─────┼── http::server ◀── HttpResponse ◀────────────┘             │
//!  response       │                                                             │
//!                 │  config · observability (tracing, metrics) · lifecycle     │
//!                 └────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rtb_bidder::config::{load_config, BidderConfig};
use rtb_bidder::lifecycle::signals::spawn_signal_handler;
use rtb_bidder::observability::{logging::init_logging, metrics::init_metrics};
use rtb_bidder::{Bidder, Interceptors, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "rtb-bidder", version, about = "Real-time bidding server")]
struct Cli {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("rtb-bidder: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => BidderConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rtb-bidder starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        exchange = %config.exchange.name,
        features = ?config.features.enabled,
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(error = %e, "Invalid metrics address"),
        }
    }

    let bidder = match Bidder::build(config, Interceptors::default()) {
        Ok(bidder) => bidder,
        Err(e) => {
            tracing::error!(error = %e, "Failed to compose bidder");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    if let Err(e) = bidder.run(shutdown).await {
        tracing::error!(error = %e, "Bidder stopped with error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
