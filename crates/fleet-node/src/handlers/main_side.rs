//! Handlers registered on main.

use std::sync::Arc;

use fleet_bus::{CommandRegistry, ConfigurationError, HandlerError};
use fleet_types::CommandName;
use tracing::debug;

use super::{HandlerDeps, ReloadExternalSecrets, ReloadLicense, WorkflowRef};

/// Worker responses main keeps track of.
pub const TRACKED_RESPONSES: [CommandName; 4] = [
    CommandName::GetStatus,
    CommandName::GetId,
    CommandName::ReloadExternalSecretsProviders,
    CommandName::RestartEventBus,
];

pub fn register(
    registry: &mut CommandRegistry,
    deps: &HandlerDeps,
) -> Result<(), ConfigurationError> {
    let services = &deps.services;

    registry.register(
        CommandName::ReloadLicense,
        Arc::new(ReloadLicense {
            license: services.license.clone(),
        }),
    )?;
    registry.register(
        CommandName::ReloadExternalSecretsProviders,
        Arc::new(ReloadExternalSecrets {
            external_secrets: services.external_secrets.clone(),
        }),
    )?;

    let webhooks = services.webhooks.clone();
    registry.register_typed(CommandName::AddWebhooks, move |payload: WorkflowRef| {
        let webhooks = webhooks.clone();
        async move {
            webhooks
                .add(&payload.workflow_id)
                .await
                .map_err(HandlerError::failed)
        }
    })?;

    let webhooks = services.webhooks.clone();
    registry.register_typed(CommandName::RemoveWebhooks, move |payload: WorkflowRef| {
        let webhooks = webhooks.clone();
        async move {
            webhooks
                .remove(&payload.workflow_id)
                .await
                .map_err(HandlerError::failed)
        }
    })?;

    let display = services.display.clone();
    registry.register_typed(
        CommandName::DisplayWorkflowActivation,
        move |payload: WorkflowRef| {
            display.activated(&payload.workflow_id);
            async { Ok(()) }
        },
    )?;

    let display = services.display.clone();
    registry.register_typed(
        CommandName::DisplayWorkflowDeactivation,
        move |payload: WorkflowRef| {
            display.deactivated(&payload.workflow_id);
            async { Ok(()) }
        },
    )?;

    for command in TRACKED_RESPONSES {
        let board = deps.status_board.clone();
        registry.register_worker_response_fn(command, move |response| {
            debug!(worker_id = %response.worker_id, command = %response.command, "Worker reported");
            board.record(&response);
            async { Ok(()) }
        })?;
    }

    Ok(())
}
