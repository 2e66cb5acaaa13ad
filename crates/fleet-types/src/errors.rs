//! # Error Types
//!
//! Errors raised while decoding envelopes or parsing identity settings.

use thiserror::Error;

/// Errors from turning raw bytes into an [`Envelope`](crate::Envelope).
///
/// Always recoverable: the subscriber logs and discards the message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input is not a JSON object.
    #[error("Envelope is not a JSON object: {0}")]
    Syntax(String),

    /// The `__type` discriminator is missing or not a string.
    #[error("Envelope has no `__type` discriminator")]
    MissingDiscriminator,

    /// The discriminator names no known variant.
    #[error("Unknown envelope type: {0}")]
    UnknownType(String),

    /// A required header field is absent.
    #[error("Envelope is missing required field `{0}`")]
    MissingField(&'static str),

    /// A command or worker response names a command this build does not know.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The variant was recognised but its body does not fit.
    #[error("Malformed {type_name} envelope: {reason}")]
    Malformed { type_name: String, reason: String },
}

impl DecodeError {
    /// Short label for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "syntax",
            Self::MissingDiscriminator => "missing_discriminator",
            Self::UnknownType(_) => "unknown_type",
            Self::MissingField(_) => "missing_field",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Errors from parsing identity and deployment settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Instance id must not be empty")]
    EmptyInstanceId,

    #[error("Unknown execution mode '{0}' (expected 'regular' or 'queue')")]
    UnknownMode(String),

    #[error("Unknown instance role '{0}' (expected 'main' or 'worker')")]
    UnknownRole(String),
}
