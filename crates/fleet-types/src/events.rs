//! # Audit / Event Messages
//!
//! Structured, replayable events emitted by main and workers. They are not
//! sent over the command channels; destinations (webhook, file, syslog) are
//! external and consume the serialized form.
//!
//! ## Anonymization
//!
//! Each variant declares the payload keys that carry personal data through
//! [`Anonymize::SENSITIVE_FIELDS`]. By convention any payload key starting
//! with `_` is personal as well. Redacted values become [`REDACTED`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::{Header, MessageId};

/// Replacement value for redacted payload fields.
pub const REDACTED: &str = "*";

/// Event payloads are JSON objects.
pub type EventPayload = Map<String, Value>;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    #[default]
    Info,
    Warning,
    Error,
}

/// Where an event was emitted from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// Recognised options for building an event.
///
/// `id` and `ts` default to a fresh id and the current time.
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    pub id: Option<MessageId>,
    pub ts: Option<DateTime<Utc>>,
    pub event_name: String,
    pub message: Option<String>,
    pub level: EventLevel,
    pub source: Option<EventSource>,
    pub payload: Option<EventPayload>,
}

impl EventOptions {
    #[must_use]
    pub fn named(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Fields shared by every event variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    #[serde(flatten)]
    pub header: Header,

    pub event_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub level: EventLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

impl EventBody {
    #[must_use]
    pub fn from_options(options: EventOptions) -> Self {
        Self {
            header: Header::with(options.id, options.ts),
            event_name: options.event_name,
            message: options.message,
            level: options.level,
            source: options.source,
            payload: options.payload,
        }
    }

    /// Copy with sensitive payload keys replaced by [`REDACTED`].
    fn redacted(&self, fields: &[&str], underscore_keys: bool) -> Self {
        let mut copy = self.clone();
        if let Some(payload) = copy.payload.as_mut() {
            for (key, value) in payload.iter_mut() {
                let personal =
                    fields.contains(&key.as_str()) || (underscore_keys && key.starts_with('_'));
                if personal {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
        copy
    }
}

/// Removes personal data from a message.
///
/// Implementations return a new value and leave `self` untouched.
pub trait Anonymize: Sized {
    /// Payload keys that carry personal data.
    const SENSITIVE_FIELDS: &'static [&'static str];

    /// Whether `_`-prefixed payload keys are redacted as well.
    const REDACT_UNDERSCORE_KEYS: bool = true;

    fn anonymize(&self) -> Self;
}

/// Which event variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Generic,
    Audit,
    Workflow,
    Node,
}

/// Free-form event with no personal data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenericEvent(pub EventBody);

impl Anonymize for GenericEvent {
    const SENSITIVE_FIELDS: &'static [&'static str] = &[];
    const REDACT_UNDERSCORE_KEYS: bool = false;

    fn anonymize(&self) -> Self {
        self.clone()
    }
}

/// User and credential audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEvent(pub EventBody);

impl Anonymize for AuditEvent {
    const SENSITIVE_FIELDS: &'static [&'static str] =
        &["email", "firstName", "lastName", "credentialData"];

    fn anonymize(&self) -> Self {
        Self(
            self.0
                .redacted(Self::SENSITIVE_FIELDS, Self::REDACT_UNDERSCORE_KEYS),
        )
    }
}

/// Workflow lifecycle (started, success, failed, saved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowEvent(pub EventBody);

impl Anonymize for WorkflowEvent {
    const SENSITIVE_FIELDS: &'static [&'static str] = &["userEmail"];

    fn anonymize(&self) -> Self {
        Self(
            self.0
                .redacted(Self::SENSITIVE_FIELDS, Self::REDACT_UNDERSCORE_KEYS),
        )
    }
}

/// Node execution started / finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeEvent(pub EventBody);

impl Anonymize for NodeEvent {
    const SENSITIVE_FIELDS: &'static [&'static str] = &[];

    fn anonymize(&self) -> Self {
        Self(
            self.0
                .redacted(Self::SENSITIVE_FIELDS, Self::REDACT_UNDERSCORE_KEYS),
        )
    }
}

/// Acknowledges that the envelope `confirm` was received by a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmEvent {
    #[serde(flatten)]
    pub header: Header,

    pub confirm: MessageId,
}

impl ConfirmEvent {
    #[must_use]
    pub fn new(confirm: MessageId) -> Self {
        Self {
            header: Header::new(),
            confirm,
        }
    }
}
