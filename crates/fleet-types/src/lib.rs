//! # Fleet Types
//!
//! The envelope model shared by the main process and every worker.
//!
//! ## Design Principles
//!
//! - **Closed Union**: Every message on the wire is one [`Envelope`] variant,
//!   selected by the `__type` discriminator. Unknown discriminators fail to
//!   decode with a tagged [`DecodeError`] instead of being half-parsed.
//! - **Publisher-Stamped Identity**: `senderId` on a [`CommandMessage`] is
//!   written by the publisher, never trusted from the caller.
//! - **Pure Transforms**: `to_json`, `from_json` and `anonymize` have no side
//!   effects and never panic.

pub mod command;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod identity;

pub use command::{CommandMessage, CommandName, WorkerResponseMessage};
pub use envelope::{Envelope, Header, MessageId, TYPE_FIELD};
pub use errors::{DecodeError, IdentityError};
pub use events::{
    Anonymize, AuditEvent, ConfirmEvent, EventBody, EventKind, EventLevel, EventOptions,
    EventPayload, EventSource, GenericEvent, NodeEvent, WorkflowEvent, REDACTED,
};
pub use identity::{ExecutionMode, InstanceId, InstanceRole};
