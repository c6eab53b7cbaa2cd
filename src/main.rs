//! Balance engine daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ loader/validation ──▶ EngineConfig
//!        │                                    │
//!        ▼                                    ▼
//!   ConfigWatcher ── watch list ──▶ ┌───────────────────────────────────────┐
//!                                   │            BalanceEngine              │
//!   admin API (axum) ─────────────▶ │  Monitor ──▶ BatchScheduler           │
//!                                   │                │                      │
//!                                   │   ResultCache ◀┤                      │
//!                                   │                ▼                      │
//!                                   │  RateLimiter ──▶ ProviderRegistry     │
//!                                   │                   │   evm / solana /  │
//!                                   │                   │   esplora         │
//!                                   └───────────────────┼───────────────────┘
//!                                                       ▼
//!                                               public RPC endpoints
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use balance_engine::admin::{self, AdminState};
use balance_engine::config::{load_config, watcher::ConfigWatcher};
use balance_engine::lifecycle::{wait_for_signal, Shutdown};
use balance_engine::observability::{logging::init_logging, metrics::init_metrics};
use balance_engine::BalanceEngine;

#[derive(Parser)]
#[command(name = "balance-engine")]
#[command(about = "Multi-network balance aggregation and monitoring daemon", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Do not reload the watch list when the config file changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        networks = config.networks.len(),
        watches = config.watch.len(),
        "balance-engine starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = Arc::new(BalanceEngine::from_config(&config)?);
    engine.sync_watch_list(&config.watch);

    let shutdown = Shutdown::new();

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            engine: engine.clone(),
            api_key: config.admin.api_key.as_str().into(),
        };
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let (watcher, mut updates) = ConfigWatcher::new(&args.config);
    let _watcher = if args.no_watch {
        None
    } else {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher unavailable, hot reload disabled");
                None
            }
        }
    };

    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            Some(new_config) = updates.recv() => {
                engine.sync_watch_list(&new_config.watch);
            }
        }
    }

    tracing::info!("Shutting down");
    shutdown.trigger();
    engine.shutdown();

    if let Some(task) = admin_task {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            tracing::warn!("Admin API did not stop within 5s");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
