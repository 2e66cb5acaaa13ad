//! # Command Handlers
//!
//! What main and workers do when a command arrives.
//!
//! | Command | Main | Worker |
//! |---------|------|--------|
//! | `reloadLicense` | reload | reload |
//! | `reloadExternalSecretsProviders` | reload | reload, respond |
//! | `addWebhooks` / `removeWebhooks` | (de)register | - |
//! | `displayWorkflowActivation` / `...Deactivation` | push to editors | - |
//! | `restartEventBus` | - | restart, respond |
//! | `getStatus` / `getId` | - | respond |
//! | `stopWorker` | - | request shutdown |
//!
//! Main additionally records every worker response on the status board.

pub mod main_side;
pub mod worker_side;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fleet_bus::{CommandHandler, CommandRegistry, ConfigurationError, HandlerError, Publisher};
use fleet_types::{CommandMessage, InstanceId, InstanceRole};
use serde::Deserialize;
use tokio::sync::watch;

use crate::services::{ExternalSecretsService, LicenseService, Services};
use crate::status::WorkerStatusBoard;

/// Everything handlers close over.
#[derive(Clone)]
pub struct HandlerDeps {
    pub identity: Option<InstanceId>,
    pub publisher: Arc<Publisher>,
    pub services: Services,
    pub status_board: Arc<WorkerStatusBoard>,
    pub stop: Arc<watch::Sender<bool>>,
    pub started_at: Instant,
}

/// Payload of workflow-scoped commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRef {
    pub workflow_id: String,
}

/// Build the registry for `role`.
pub fn build_registry(
    role: InstanceRole,
    deps: &HandlerDeps,
) -> Result<CommandRegistry, ConfigurationError> {
    let mut registry = CommandRegistry::new(role);
    match role {
        InstanceRole::Main => main_side::register(&mut registry, deps)?,
        InstanceRole::Worker => worker_side::register(&mut registry, deps)?,
    }
    Ok(registry)
}

/// Shared by both roles.
pub struct ReloadLicense {
    pub license: Arc<dyn LicenseService>,
}

#[async_trait]
impl CommandHandler for ReloadLicense {
    async fn handle(&self, _command: &CommandMessage) -> Result<(), HandlerError> {
        self.license.reload().await.map_err(HandlerError::failed)
    }
}

/// Main-side variant; workers answer through [`worker_side`].
pub struct ReloadExternalSecrets {
    pub external_secrets: Arc<dyn ExternalSecretsService>,
}

#[async_trait]
impl CommandHandler for ReloadExternalSecrets {
    async fn handle(&self, _command: &CommandMessage) -> Result<(), HandlerError> {
        self.external_secrets
            .reload_providers()
            .await
            .map_err(HandlerError::failed)
    }
}
