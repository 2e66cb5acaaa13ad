//! # Service Ports
//!
//! Operational services that commands act on. Their implementations live
//! outside the bus; the logging variants here let a node run standalone.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Re-reads the license.
#[async_trait]
pub trait LicenseService: Send + Sync {
    async fn reload(&self) -> Result<()>;
}

/// Reconnects external secrets providers.
#[async_trait]
pub trait ExternalSecretsService: Send + Sync {
    async fn reload_providers(&self) -> Result<()>;
}

/// Registers and deregisters a workflow's webhooks, triggers and pollers.
#[async_trait]
pub trait WebhookService: Send + Sync {
    async fn add(&self, workflow_id: &str) -> Result<()>;
    async fn remove(&self, workflow_id: &str) -> Result<()>;
}

/// Restarts the local event bus.
#[async_trait]
pub trait EventBusService: Send + Sync {
    async fn restart(&self) -> Result<()>;
}

/// Pushes activation state changes to connected editors.
pub trait ActivationDisplay: Send + Sync {
    fn activated(&self, workflow_id: &str);
    fn deactivated(&self, workflow_id: &str);
}

/// Every service a handler may need.
#[derive(Clone)]
pub struct Services {
    pub license: Arc<dyn LicenseService>,
    pub external_secrets: Arc<dyn ExternalSecretsService>,
    pub webhooks: Arc<dyn WebhookService>,
    pub event_bus: Arc<dyn EventBusService>,
    pub display: Arc<dyn ActivationDisplay>,
}

impl Services {
    /// Services that only log what they were asked to do.
    #[must_use]
    pub fn logging() -> Self {
        let logging = Arc::new(LoggingServices);
        Self {
            license: logging.clone(),
            external_secrets: logging.clone(),
            webhooks: logging.clone(),
            event_bus: logging.clone(),
            display: logging,
        }
    }
}

/// Logs each call and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingServices;

#[async_trait]
impl LicenseService for LoggingServices {
    async fn reload(&self) -> Result<()> {
        info!("License reloaded");
        Ok(())
    }
}

#[async_trait]
impl ExternalSecretsService for LoggingServices {
    async fn reload_providers(&self) -> Result<()> {
        info!("External secrets providers reloaded");
        Ok(())
    }
}

#[async_trait]
impl WebhookService for LoggingServices {
    async fn add(&self, workflow_id: &str) -> Result<()> {
        info!(workflow_id = workflow_id, "Webhooks added");
        Ok(())
    }

    async fn remove(&self, workflow_id: &str) -> Result<()> {
        info!(workflow_id = workflow_id, "Webhooks removed");
        Ok(())
    }
}

#[async_trait]
impl EventBusService for LoggingServices {
    async fn restart(&self) -> Result<()> {
        info!("Event bus restarted");
        Ok(())
    }
}

impl ActivationDisplay for LoggingServices {
    fn activated(&self, workflow_id: &str) {
        info!(workflow_id = workflow_id, "Workflow activated");
    }

    fn deactivated(&self, workflow_id: &str) {
        info!(workflow_id = workflow_id, "Workflow deactivated");
    }
}
