//! # Instance Identity
//!
//! The process-wide `senderId` and the deployment settings that decide
//! whether the bus talks to a messaging backend at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::IdentityError;

/// Identity of one process on the bus.
///
/// Assigned once at startup in queue mode and never reassigned.
/// Blank ids are rejected on decode just as in [`InstanceId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an externally supplied identity.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::EmptyInstanceId` for blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(IdentityError::EmptyInstanceId);
        }
        Ok(Self(id))
    }

    /// Generate a random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InstanceId {
    type Error = IdentityError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

impl FromStr for InstanceId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// How executions are distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Single process. The bus never opens a transport connection.
    #[default]
    Regular,
    /// Main plus workers talking over the messaging backend.
    Queue,
}

impl ExecutionMode {
    #[must_use]
    pub fn is_queue(&self) -> bool {
        matches!(self, Self::Queue)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Queue => "queue",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "queue" => Ok(Self::Queue),
            other => Err(IdentityError::UnknownMode(other.to_string())),
        }
    }
}

/// Which side of the bus a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceRole {
    /// Control plane. Issues commands and consumes worker responses.
    #[default]
    Main,
    /// Executes jobs and answers commands.
    Worker,
}

impl InstanceRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceRole {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "worker" => Ok(Self::Worker),
            other => Err(IdentityError::UnknownRole(other.to_string())),
        }
    }
}
