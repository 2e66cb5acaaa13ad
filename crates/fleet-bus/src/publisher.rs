//! # Publisher
//!
//! Sends commands and worker responses on the bus.
//!
//! In regular mode the publisher never creates a transport client and every
//! publish is a silent no-op. In queue mode it owns exactly one client for its
//! whole life.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fleet_telemetry::BUS_MESSAGES_PUBLISHED;
use fleet_types::{CommandMessage, Envelope, InstanceId, WorkerResponseMessage};
use tracing::{debug, info};

use crate::channel::{Channel, ChannelNames};
use crate::config::BusConfig;
use crate::error::{BusError, TransportError};
use crate::sink::{EventSink, LogSink};
use crate::transport::{ClientPurpose, PubSubClient, TransportProvider};

/// Outbound side of the bus.
pub struct Publisher {
    client: Option<Arc<dyn PubSubClient>>,
    sender_id: Option<InstanceId>,
    channels: ChannelNames,
    sink: Arc<dyn EventSink>,
    shut_down: AtomicBool,
}

impl Publisher {
    /// Create the publisher for this process.
    ///
    /// # Errors
    ///
    /// `MissingIdentity` in queue mode without an instance id, or the
    /// provider's error if it cannot create a client.
    pub fn new(config: &BusConfig, provider: &dyn TransportProvider) -> Result<Self, BusError> {
        if !config.mode.is_queue() {
            debug!(mode = config.mode.as_str(), "Publisher created without transport client");
            return Ok(Self {
                client: None,
                sender_id: None,
                channels: config.channels.clone(),
                sink: Arc::new(LogSink),
                shut_down: AtomicBool::new(false),
            });
        }

        let sender_id = config.require_identity()?.clone();
        let client = provider.create_client(ClientPurpose::Publisher)?;

        info!(sender_id = %sender_id, role = %config.role, "Publisher ready");

        Ok(Self {
            client: Some(client),
            sender_id: Some(sender_id),
            channels: config.channels.clone(),
            sink: Arc::new(LogSink),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Route events to `sink` instead of the log.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The transport client, absent in regular mode.
    #[must_use]
    pub fn client(&self) -> Option<Arc<dyn PubSubClient>> {
        self.client.clone()
    }

    #[must_use]
    pub fn sender_id(&self) -> Option<&InstanceId> {
        self.sender_id.as_ref()
    }

    /// Broadcast `command` to every process, stamped with this instance's id.
    pub async fn publish_command(&self, command: CommandMessage) -> Result<(), BusError> {
        let (Some(client), Some(sender_id)) = (&self.client, &self.sender_id) else {
            debug!(command = %command.command, "Regular mode, command not published");
            return Ok(());
        };

        let name = command.command;
        let envelope = Envelope::Command(command.stamped(sender_id.clone()));
        self.send(client.as_ref(), Channel::Commands, &envelope).await?;

        debug!(command = %name, envelope_id = %envelope.id(), "Command published");
        Ok(())
    }

    /// Send `response` to main. Published as given.
    pub async fn publish_worker_response(
        &self,
        response: WorkerResponseMessage,
    ) -> Result<(), BusError> {
        let Some(client) = &self.client else {
            debug!(command = %response.command, "Regular mode, worker response not published");
            return Ok(());
        };

        let name = response.command;
        let envelope = Envelope::WorkerResponse(response);
        self.send(client.as_ref(), Channel::WorkerResponse, &envelope).await?;

        debug!(command = %name, envelope_id = %envelope.id(), "Worker response published");
        Ok(())
    }

    /// Hand an event envelope to the event sink.
    ///
    /// # Errors
    ///
    /// `NotAnEvent` for command and worker-response envelopes.
    pub async fn publish_event(&self, event: Envelope) -> Result<(), BusError> {
        if matches!(event, Envelope::Command(_) | Envelope::WorkerResponse(_)) {
            return Err(BusError::NotAnEvent(event.type_name()));
        }
        self.sink.emit(&event).await
    }

    /// Disconnect the transport client. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(client) = &self.client {
            client.disconnect().await;
            info!("Publisher disconnected");
        }
    }

    async fn send(
        &self,
        client: &dyn PubSubClient,
        channel: Channel,
        envelope: &Envelope,
    ) -> Result<(), BusError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }

        let payload = envelope.to_json()?;
        client
            .publish(&self.channels.resolve(channel), &payload)
            .await?;

        BUS_MESSAGES_PUBLISHED
            .with_label_values(&[channel.name()])
            .inc();
        Ok(())
    }
}
