//! # Dispatcher
//!
//! Turns one raw message into at most one handler invocation.
//!
//! ## Filtering Order (commands channel)
//!
//! 1. Decode; undecodable input is dropped.
//! 2. Drop commands this process published itself.
//! 3. Drop commands targeted at other instances.
//! 4. Look up the handler; no handler means drop.
//!
//! A handler error or panic is logged and counted. It never escapes
//! [`Dispatcher::dispatch`], so the receive loop keeps going.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use fleet_telemetry::{BUS_HANDLER_FAILURES, BUS_MESSAGES_DISCARDED, BUS_MESSAGES_RECEIVED};
use fleet_types::{
    CommandMessage, CommandName, DecodeError, Envelope, InstanceId, MessageId,
    WorkerResponseMessage,
};
use futures::FutureExt;
use tracing::{debug, error, trace, warn};

use crate::channel::Channel;
use crate::error::HandlerError;
use crate::registry::CommandRegistry;

/// Why a message never reached a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    Undecodable,
    UnknownCommand,
    UnexpectedKind,
    SelfOrigin,
    NotTargeted,
    NoHandler,
}

impl DiscardReason {
    /// Metrics label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undecodable => "undecodable",
            Self::UnknownCommand => "unknown_command",
            Self::UnexpectedKind => "unexpected_kind",
            Self::SelfOrigin => "self_origin",
            Self::NotTargeted => "not_targeted",
            Self::NoHandler => "no_handler",
        }
    }
}

/// Result of dispatching one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { command: CommandName },
    Discarded(DiscardReason),
    HandlerFailed { command: CommandName, error: HandlerError },
}

impl DispatchOutcome {
    #[must_use]
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// Routes decoded envelopes to registry handlers.
pub struct Dispatcher {
    identity: Option<InstanceId>,
    registry: Arc<CommandRegistry>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(identity: Option<InstanceId>, registry: Arc<CommandRegistry>) -> Self {
        Self { identity, registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Decode `raw` received on `channel` and invoke the matching handler.
    pub async fn dispatch(&self, channel: Channel, raw: &str) -> DispatchOutcome {
        BUS_MESSAGES_RECEIVED
            .with_label_values(&[channel.name()])
            .inc();

        let envelope = match Envelope::from_json(raw) {
            Ok(envelope) => envelope,
            Err(DecodeError::UnknownCommand(name)) => {
                debug!(channel = %channel, command = %name, "Skipping command unknown to this build");
                return discard(channel, DiscardReason::UnknownCommand);
            }
            Err(e) => {
                warn!(channel = %channel, kind = e.kind(), error = %e, "Discarding undecodable message");
                return discard(channel, DiscardReason::Undecodable);
            }
        };

        match (channel, envelope) {
            (Channel::Commands, Envelope::Command(command)) => {
                self.dispatch_command(command).await
            }
            (Channel::WorkerResponse, Envelope::WorkerResponse(response)) => {
                self.dispatch_worker_response(response).await
            }
            (channel, other) => {
                warn!(
                    channel = %channel,
                    envelope_type = other.type_name(),
                    envelope_id = %other.id(),
                    "Unexpected envelope type on channel"
                );
                discard(channel, DiscardReason::UnexpectedKind)
            }
        }
    }

    async fn dispatch_command(&self, command: CommandMessage) -> DispatchOutcome {
        let channel = Channel::Commands;

        if let Some(own) = &self.identity {
            if command.is_from(own) {
                trace!(command = %command.command, "Ignoring own command");
                return discard(channel, DiscardReason::SelfOrigin);
            }
            if !command.is_targeted_at(own) {
                debug!(command = %command.command, "Command targeted at other instances");
                return discard(channel, DiscardReason::NotTargeted);
            }
        }

        let Some(handler) = self.registry.command_handler(command.command) else {
            debug!(command = %command.command, role = %self.registry.role(), "No handler registered");
            return discard(channel, DiscardReason::NoHandler);
        };

        debug!(
            command = %command.command,
            envelope_id = %command.header.id,
            sender_id = ?command.sender_id.as_ref().map(InstanceId::as_str),
            "Handling command"
        );

        let result = AssertUnwindSafe(handler.handle(&command))
            .catch_unwind()
            .await;
        complete(command.command, command.header.id, result)
    }

    async fn dispatch_worker_response(&self, response: WorkerResponseMessage) -> DispatchOutcome {
        let channel = Channel::WorkerResponse;

        let Some(handler) = self.registry.worker_response_handler(response.command) else {
            debug!(command = %response.command, worker_id = %response.worker_id, "No worker-response handler registered");
            return discard(channel, DiscardReason::NoHandler);
        };

        debug!(
            command = %response.command,
            worker_id = %response.worker_id,
            "Handling worker response"
        );

        let result = AssertUnwindSafe(handler.handle(&response))
            .catch_unwind()
            .await;
        complete(response.command, response.header.id, result)
    }
}

fn discard(channel: Channel, reason: DiscardReason) -> DispatchOutcome {
    BUS_MESSAGES_DISCARDED
        .with_label_values(&[channel.name(), reason.as_str()])
        .inc();
    DispatchOutcome::Discarded(reason)
}

fn complete(
    command: CommandName,
    envelope_id: MessageId,
    result: Result<Result<(), HandlerError>, Box<dyn Any + Send>>,
) -> DispatchOutcome {
    let error = match result {
        Ok(Ok(())) => {
            debug!(command = %command, envelope_id = %envelope_id, "Handler completed");
            return DispatchOutcome::Handled { command };
        }
        Ok(Err(e)) => e,
        Err(panic) => HandlerError::Panicked(panic_message(panic.as_ref())),
    };

    error!(command = %command, envelope_id = %envelope_id, error = %error, "Handler failed");
    BUS_HANDLER_FAILURES
        .with_label_values(&[command.as_str()])
        .inc();
    DispatchOutcome::HandlerFailed { command, error }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
