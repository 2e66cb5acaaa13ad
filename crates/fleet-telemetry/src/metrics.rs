//! Prometheus metrics for the command bus.
//!
//! All metrics follow the naming convention: `fleet_bus_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Envelopes handed to the transport
    pub static ref BUS_MESSAGES_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_messages_published_total", "Envelopes published on the bus"),
        &["channel"]
    ).expect("metric creation failed");

    /// Raw messages received from the transport
    pub static ref BUS_MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_messages_received_total", "Raw messages received from the bus"),
        &["channel"]
    ).expect("metric creation failed");

    /// Messages dropped before reaching a handler
    pub static ref BUS_MESSAGES_DISCARDED: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_messages_discarded_total", "Messages discarded by the dispatcher"),
        // reason: undecodable/unknown_command/unexpected_kind/self_origin/not_targeted/no_handler
        &["channel", "reason"]
    ).expect("metric creation failed");

    /// Handler errors and panics
    pub static ref BUS_HANDLER_FAILURES: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_handler_failures_total", "Handler invocations that failed"),
        &["command"]
    ).expect("metric creation failed");

    /// Subscription re-establishments after a dropped connection
    pub static ref BUS_RECONNECTS: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_reconnects_total", "Subscription reconnect attempts"),
        &["channel"]
    ).expect("metric creation failed");

    /// 1 while the channel subscription is live
    pub static ref BUS_SUBSCRIBED: IntGaugeVec = IntGaugeVec::new(
        Opts::new("fleet_bus_subscribed", "Whether the channel subscription is live"),
        &["channel"]
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BUS_MESSAGES_PUBLISHED.clone()),
        Box::new(BUS_MESSAGES_RECEIVED.clone()),
        Box::new(BUS_MESSAGES_DISCARDED.clone()),
        Box::new(BUS_HANDLER_FAILURES.clone()),
        Box::new(BUS_RECONNECTS.clone()),
        Box::new(BUS_SUBSCRIBED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
