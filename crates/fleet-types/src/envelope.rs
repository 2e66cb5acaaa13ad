//! # Envelope
//!
//! The tagged union of every message variant.
//!
//! ## Wire Format
//!
//! UTF-8 JSON objects with a `__type` discriminator and the common header
//! (`id`, `ts`). Unknown extra fields are ignored so that older receivers
//! accept envelopes from newer senders.
//!
//! ```text
//! {"__type":"command","id":"…","ts":"2024-05-01T12:00:00Z",
//!  "command":"reloadLicense","senderId":"abc"}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::command::{CommandMessage, CommandName, WorkerResponseMessage};
use crate::errors::DecodeError;
use crate::events::{
    Anonymize, AuditEvent, ConfirmEvent, EventBody, EventKind, EventOptions, GenericEvent,
    NodeEvent, WorkflowEvent,
};

/// Name of the discriminator field.
pub const TYPE_FIELD: &str = "__type";

/// Unique envelope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Header shared by every variant. Set at construction, never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub id: MessageId,
    pub ts: DateTime<Utc>,
}

impl Header {
    #[must_use]
    pub fn new() -> Self {
        Self::with(None, None)
    }

    /// Header from optional parts, defaulting to a fresh id and now.
    #[must_use]
    pub fn with(id: Option<MessageId>, ts: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.unwrap_or_default(),
            ts: ts.unwrap_or_else(Utc::now),
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Every message that can be published or emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type")]
pub enum Envelope {
    #[serde(rename = "event.generic")]
    Generic(GenericEvent),
    #[serde(rename = "event.audit")]
    Audit(AuditEvent),
    #[serde(rename = "event.workflow")]
    Workflow(WorkflowEvent),
    #[serde(rename = "event.node")]
    Node(NodeEvent),
    #[serde(rename = "event.confirm")]
    Confirm(ConfirmEvent),
    #[serde(rename = "command")]
    Command(CommandMessage),
    #[serde(rename = "worker-response")]
    WorkerResponse(WorkerResponseMessage),
}

impl Envelope {
    /// Every discriminator this build can decode.
    pub const KNOWN_TYPES: [&'static str; 7] = [
        "event.generic",
        "event.audit",
        "event.workflow",
        "event.node",
        "event.confirm",
        "command",
        "worker-response",
    ];

    /// Build an event variant from options.
    #[must_use]
    pub fn new_event(kind: EventKind, options: EventOptions) -> Self {
        let body = EventBody::from_options(options);
        match kind {
            EventKind::Generic => Self::Generic(GenericEvent(body)),
            EventKind::Audit => Self::Audit(AuditEvent(body)),
            EventKind::Workflow => Self::Workflow(WorkflowEvent(body)),
            EventKind::Node => Self::Node(NodeEvent(body)),
        }
    }

    /// The `__type` discriminator of this variant.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Generic(_) => "event.generic",
            Self::Audit(_) => "event.audit",
            Self::Workflow(_) => "event.workflow",
            Self::Node(_) => "event.node",
            Self::Confirm(_) => "event.confirm",
            Self::Command(_) => "command",
            Self::WorkerResponse(_) => "worker-response",
        }
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        match self {
            Self::Generic(e) => &e.0.header,
            Self::Audit(e) => &e.0.header,
            Self::Workflow(e) => &e.0.header,
            Self::Node(e) => &e.0.header,
            Self::Confirm(e) => &e.header,
            Self::Command(c) => &c.header,
            Self::WorkerResponse(r) => &r.header,
        }
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.header().id
    }

    #[must_use]
    pub fn ts(&self) -> DateTime<Utc> {
        self.header().ts
    }

    #[must_use]
    pub fn as_command(&self) -> Option<&CommandMessage> {
        match self {
            Self::Command(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_worker_response(&self) -> Option<&WorkerResponseMessage> {
        match self {
            Self::WorkerResponse(r) => Some(r),
            _ => None,
        }
    }

    /// Copy with personal data removed. Never fails, never mutates `self`.
    #[must_use]
    pub fn anonymize(&self) -> Self {
        match self {
            Self::Generic(e) => Self::Generic(e.anonymize()),
            Self::Audit(e) => Self::Audit(e.anonymize()),
            Self::Workflow(e) => Self::Workflow(e.anonymize()),
            Self::Node(e) => Self::Node(e.anonymize()),
            Self::Confirm(_) | Self::Command(_) | Self::WorkerResponse(_) => self.clone(),
        }
    }

    /// Serialize to the wire format.
    ///
    /// # Errors
    ///
    /// Only fails if a payload holds something JSON cannot represent.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode an envelope from its wire format.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] describing why the input was rejected.
    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::Syntax(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decode an envelope from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`Envelope::from_json`].
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let Some(object) = value.as_object() else {
            return Err(DecodeError::Syntax("expected a JSON object".to_string()));
        };

        let type_name = match object.get(TYPE_FIELD) {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(DecodeError::MissingDiscriminator),
        };
        if !Self::KNOWN_TYPES.contains(&type_name.as_str()) {
            return Err(DecodeError::UnknownType(type_name));
        }

        for field in ["id", "ts"] {
            if !object.contains_key(field) {
                return Err(DecodeError::MissingField(field));
            }
        }

        // Report unknown command names distinctly so receivers can skip them.
        if type_name == "command" || type_name == "worker-response" {
            if let Some(Value::String(name)) = object.get("command") {
                name.parse::<CommandName>()?;
            }
        }

        serde_json::from_value(value)
            .map_err(|e| DecodeError::Malformed { type_name, reason: e.to_string() })
    }
}

impl From<CommandMessage> for Envelope {
    fn from(command: CommandMessage) -> Self {
        Self::Command(command)
    }
}

impl From<WorkerResponseMessage> for Envelope {
    fn from(response: WorkerResponseMessage) -> Self {
        Self::WorkerResponse(response)
    }
}
