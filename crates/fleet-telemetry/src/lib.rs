//! # Fleet Telemetry
//!
//! Structured logging and Prometheus metrics for main and worker processes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_role("worker");
//! let _guard = init_telemetry(config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FLEET_SERVICE_NAME` | `fleet` | Service name in logs |
//! | `FLEET_LOG_LEVEL` | `info` | Log level filter |
//! | `FLEET_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `FLEET_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, BUS_HANDLER_FAILURES,
    BUS_MESSAGES_DISCARDED, BUS_MESSAGES_PUBLISHED, BUS_MESSAGES_RECEIVED, BUS_RECONNECTS,
    BUS_SUBSCRIBED,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Initialize metrics first
    let metrics_handle = register_metrics()?;

    tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _metrics: metrics_handle,
        config,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
    config: TelemetryConfig,
}

impl TelemetryGuard {
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.config.full_service_name(), "Shutting down telemetry");
    }
}
