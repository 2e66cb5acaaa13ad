//! Event sinks.
//!
//! Events never travel on the command channels. The publisher hands them to
//! an [`EventSink`]; the default one logs the anonymized envelope.

use async_trait::async_trait;
use fleet_types::Envelope;
use tracing::info;

use crate::error::BusError;

/// Destination for event envelopes.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &Envelope) -> Result<(), BusError>;
}

/// Writes each event to the log after redacting sensitive fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn emit(&self, event: &Envelope) -> Result<(), BusError> {
        let redacted = event.anonymize().to_json()?;
        info!(
            envelope_type = event.type_name(),
            envelope_id = %event.id(),
            event = %redacted,
            "Event emitted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{EventKind, EventOptions};

    #[tokio::test]
    async fn test_log_sink_accepts_events() {
        let event = Envelope::new_event(EventKind::Audit, EventOptions::named("user.login"));
        assert!(LogSink.emit(&event).await.is_ok());
    }
}
