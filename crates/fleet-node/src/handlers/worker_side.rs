//! Handlers registered on workers. Most of them answer main with a worker
//! response carrying this worker's id.

use std::sync::Arc;

use async_trait::async_trait;
use fleet_bus::{CommandHandler, CommandRegistry, ConfigurationError, HandlerError, Publisher};
use fleet_types::{CommandMessage, CommandName, InstanceId, WorkerResponseMessage};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{HandlerDeps, ReloadLicense};

pub fn register(
    registry: &mut CommandRegistry,
    deps: &HandlerDeps,
) -> Result<(), ConfigurationError> {
    let responder = Responder {
        worker_id: deps.identity.clone(),
        publisher: deps.publisher.clone(),
    };

    registry.register(
        CommandName::ReloadLicense,
        Arc::new(ReloadLicense {
            license: deps.services.license.clone(),
        }),
    )?;

    let external_secrets = deps.services.external_secrets.clone();
    let respond = responder.clone();
    registry.register_fn(CommandName::ReloadExternalSecretsProviders, move |_| {
        let external_secrets = external_secrets.clone();
        let respond = respond.clone();
        async move {
            let outcome = external_secrets.reload_providers().await;
            respond
                .send(CommandName::ReloadExternalSecretsProviders, outcome_payload(outcome))
                .await
        }
    })?;

    let event_bus = deps.services.event_bus.clone();
    let respond = responder.clone();
    registry.register_fn(CommandName::RestartEventBus, move |_| {
        let event_bus = event_bus.clone();
        let respond = respond.clone();
        async move {
            let outcome = event_bus.restart().await;
            respond
                .send(CommandName::RestartEventBus, outcome_payload(outcome))
                .await
        }
    })?;

    registry.register(
        CommandName::GetStatus,
        Arc::new(GetStatus {
            respond: responder.clone(),
            started_at: deps.started_at,
        }),
    )?;

    let respond = responder.clone();
    registry.register_fn(CommandName::GetId, move |_| {
        let respond = respond.clone();
        async move {
            let worker_id = respond.worker_id.clone();
            respond
                .send(CommandName::GetId, json!({ "workerId": worker_id }))
                .await
        }
    })?;

    let stop = deps.stop.clone();
    registry.register_fn(CommandName::StopWorker, move |command| {
        info!(sender_id = ?command.sender_id.as_ref().map(InstanceId::as_str), "Stop requested by main");
        stop.send_replace(true);
        async { Ok(()) }
    })?;

    Ok(())
}

/// Publishes worker responses on behalf of this worker.
#[derive(Clone)]
struct Responder {
    worker_id: Option<InstanceId>,
    publisher: Arc<Publisher>,
}

impl Responder {
    async fn send(&self, command: CommandName, payload: Value) -> Result<(), HandlerError> {
        let Some(worker_id) = self.worker_id.clone() else {
            debug!(command = %command, "No instance id, response not sent");
            return Ok(());
        };

        let response = WorkerResponseMessage::new(worker_id, command).with_payload(payload);
        self.publisher
            .publish_worker_response(response)
            .await
            .map_err(HandlerError::failed)
    }
}

/// `{success}` or `{success, error}`; a failed operation is reported, not raised.
fn outcome_payload(outcome: anyhow::Result<()>) -> Value {
    match outcome {
        Ok(()) => json!({ "success": true }),
        Err(e) => {
            warn!(error = %e, "Operation failed, reporting to main");
            json!({ "success": false, "error": e.to_string() })
        }
    }
}

struct GetStatus {
    respond: Responder,
    started_at: std::time::Instant,
}

#[async_trait]
impl CommandHandler for GetStatus {
    async fn handle(&self, _command: &CommandMessage) -> Result<(), HandlerError> {
        let payload = json!({
            "workerId": self.respond.worker_id,
            "uptimeSecs": self.started_at.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION"),
        });
        self.respond.send(CommandName::GetStatus, payload).await
    }
}
