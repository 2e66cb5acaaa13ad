//! Error types for the command bus

use fleet_types::{CommandName, InstanceRole};
use thiserror::Error;

/// Failures of the messaging backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection to messaging backend failed: {0}")]
    Connection(String),

    #[error("Publish on '{channel}' failed: {reason}")]
    Publish { channel: String, reason: String },

    #[error("Subscribe to '{channel}' failed: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("Connection closed")]
    Closed,
}

/// Wiring mistakes. Fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Queue mode requires an instance id")]
    MissingIdentity,

    #[error("Handler for '{command}' is already registered on {role}")]
    DuplicateHandler {
        command: CommandName,
        role: InstanceRole,
    },

    #[error("A {role} cannot register a worker-response handler for '{command}'")]
    RoleMismatch {
        command: CommandName,
        role: InstanceRole,
    },

    #[error("Registry built for {registry} handed to a {process} process")]
    RegistryRole {
        registry: InstanceRole,
        process: InstanceRole,
    },
}

/// Failures raised by application handlers. Contained by the dispatcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Invalid payload for '{command}': {reason}")]
    InvalidPayload { command: CommandName, reason: String },

    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self::Failed(error.to_string())
    }
}

/// Errors surfaced to direct callers of the bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0} envelopes go through the command channels, not the event sink")]
    NotAnEvent(&'static str),

    #[error("Event sink rejected envelope: {0}")]
    Sink(String),
}
