//! # Control Commands
//!
//! Messages carried on the `commands` and `worker-response` channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::envelope::Header;
use crate::errors::DecodeError;
use crate::identity::InstanceId;

/// Every command this build understands.
///
/// Wire names are camelCase. A name outside this list decodes to
/// `DecodeError::UnknownCommand`, so older deployments skip newer commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandName {
    /// Re-read the license from the license server.
    ReloadLicense,
    /// Reconnect external secrets providers.
    ReloadExternalSecretsProviders,
    /// Register webhooks, triggers and pollers of a workflow.
    AddWebhooks,
    /// Deregister webhooks, triggers and pollers of a workflow.
    RemoveWebhooks,
    /// Ask a worker to drain and exit.
    StopWorker,
    /// Ask workers to report their status.
    GetStatus,
    /// Ask workers to report their identity.
    GetId,
    /// Restart the event bus on every instance.
    RestartEventBus,
    /// Tell open editors a workflow was activated.
    DisplayWorkflowActivation,
    /// Tell open editors a workflow was deactivated.
    DisplayWorkflowDeactivation,
}

impl CommandName {
    pub const ALL: [CommandName; 10] = [
        Self::ReloadLicense,
        Self::ReloadExternalSecretsProviders,
        Self::AddWebhooks,
        Self::RemoveWebhooks,
        Self::StopWorker,
        Self::GetStatus,
        Self::GetId,
        Self::RestartEventBus,
        Self::DisplayWorkflowActivation,
        Self::DisplayWorkflowDeactivation,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReloadLicense => "reloadLicense",
            Self::ReloadExternalSecretsProviders => "reloadExternalSecretsProviders",
            Self::AddWebhooks => "addWebhooks",
            Self::RemoveWebhooks => "removeWebhooks",
            Self::StopWorker => "stopWorker",
            Self::GetStatus => "getStatus",
            Self::GetId => "getId",
            Self::RestartEventBus => "restartEventBus",
            Self::DisplayWorkflowActivation => "displayWorkflowActivation",
            Self::DisplayWorkflowDeactivation => "displayWorkflowDeactivation",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownCommand(s.to_string()))
    }
}

/// A control instruction broadcast to every process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    #[serde(flatten)]
    pub header: Header,

    pub command: CommandName,

    /// Identity of the publishing process. Overwritten by the publisher;
    /// whatever the caller puts here is discarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<InstanceId>,

    /// When set, only the listed instances act on the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<InstanceId>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_payload"
    )]
    pub payload: Option<Value>,
}

impl CommandMessage {
    #[must_use]
    pub fn new(command: CommandName) -> Self {
        Self {
            header: Header::new(),
            command,
            sender_id: None,
            targets: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Vec<InstanceId>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Copy of this command carrying `sender` as its origin.
    #[must_use]
    pub fn stamped(mut self, sender: InstanceId) -> Self {
        self.sender_id = Some(sender);
        self
    }

    /// True when the command was published by `instance`.
    #[must_use]
    pub fn is_from(&self, instance: &InstanceId) -> bool {
        self.sender_id.as_ref() == Some(instance)
    }

    /// True when `instance` should act on the command.
    #[must_use]
    pub fn is_targeted_at(&self, instance: &InstanceId) -> bool {
        match &self.targets {
            Some(targets) => targets.contains(instance),
            None => true,
        }
    }
}

/// A worker's answer to a command, consumed by main only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponseMessage {
    #[serde(flatten)]
    pub header: Header,

    pub worker_id: InstanceId,

    pub command: CommandName,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_payload"
    )]
    pub payload: Option<Value>,
}

impl WorkerResponseMessage {
    #[must_use]
    pub fn new(worker_id: InstanceId, command: CommandName) -> Self {
        Self {
            header: Header::new(),
            worker_id,
            command,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A `payload` key that is present decodes to `Some`, even when it holds `null`.
fn present_payload<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
