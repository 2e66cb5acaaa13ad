//! # Fleet Node
//!
//! Runs one main or worker process on the command bus.
//!
//! ## Startup Sequence
//!
//! 1. Parse configuration (flags, then environment)
//! 2. Initialize logging and metrics
//! 3. Build the transport provider (no I/O yet)
//! 4. Wire the bus context and start receiving
//! 5. Run until Ctrl-C or a `stopWorker` command
//! 6. Shut down subscriber, then publisher

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use fleet_node::{BusContext, NodeConfig, Services};
use fleet_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::parse();

    let _telemetry = init_telemetry(TelemetryConfig::for_role(config.role.as_str()))
        .context("Failed to initialize telemetry")?;

    config.validate().context("Invalid configuration")?;

    let transport = config
        .build_transport()
        .context("Failed to build transport")?;
    let context = BusContext::from_node_config(&config, transport.as_ref(), Services::logging())
        .context("Failed to wire bus context")?;

    info!("===========================================");
    info!("  Fleet Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Mode: {}  Role: {}", config.mode.as_str(), config.role);
    info!("===========================================");

    context.start();

    let mut stop = context.stop_requested();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received");
        }
        _ = stop.wait_for(|stop| *stop) => {
            info!("Stop requested");
        }
    }

    context.shutdown().await;

    match encode_metrics() {
        Ok(metrics) => debug!(metrics = %metrics, "Final bus metrics"),
        Err(e) => warn!(error = %e, "Failed to encode metrics"),
    }

    info!("Fleet node stopped");
    Ok(())
}
