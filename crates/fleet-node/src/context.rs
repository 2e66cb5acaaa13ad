//! # Bus Context
//!
//! Owns the publisher, the subscriber and the handler registry of one
//! process. Built explicitly at startup and passed to whoever needs it.
//!
//! ## Startup Sequence
//!
//! 1. Resolve identity (once)
//! 2. Create the publisher
//! 3. Build the registry for the role; handlers get the publisher
//! 4. Create the subscriber
//! 5. `start()` spawns the receive loops

use std::sync::Arc;
use std::time::Instant;

use fleet_bus::{BusConfig, BusError, Publisher, Subscriber, TransportProvider};
use fleet_types::{CommandMessage, InstanceId, InstanceRole};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::config::{ConfigError, NodeConfig};
use crate::handlers::{self, HandlerDeps};
use crate::services::Services;
use crate::status::WorkerStatusBoard;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// The bus wiring of one process.
pub struct BusContext {
    config: BusConfig,
    publisher: Arc<Publisher>,
    subscriber: Subscriber,
    status_board: Arc<WorkerStatusBoard>,
    stop: Arc<watch::Sender<bool>>,
}

impl BusContext {
    /// Wire a context from the node configuration.
    pub fn from_node_config(
        config: &NodeConfig,
        provider: &dyn TransportProvider,
        services: Services,
    ) -> Result<Self, ContextError> {
        let bus_config = config.bus_config()?;
        Ok(Self::new(bus_config, provider, services)?)
    }

    /// Wire a context from an already resolved bus configuration.
    pub fn new(
        config: BusConfig,
        provider: &dyn TransportProvider,
        services: Services,
    ) -> Result<Self, BusError> {
        let publisher = Arc::new(Publisher::new(&config, provider)?);
        let status_board = Arc::new(WorkerStatusBoard::new());
        let (stop, _) = watch::channel(false);
        let stop = Arc::new(stop);

        let deps = HandlerDeps {
            identity: config.identity.clone(),
            publisher: publisher.clone(),
            services,
            status_board: status_board.clone(),
            stop: stop.clone(),
            started_at: Instant::now(),
        };
        let registry = Arc::new(handlers::build_registry(config.role, &deps)?);
        let subscriber = Subscriber::new(&config, provider, registry)?;

        info!(
            mode = config.mode.as_str(),
            role = %config.role,
            instance_id = config.identity.as_ref().map_or("-", InstanceId::as_str),
            "Bus context created"
        );

        Ok(Self {
            config,
            publisher,
            subscriber,
            status_board,
            stop,
        })
    }

    #[must_use]
    pub fn identity(&self) -> Option<&InstanceId> {
        self.config.identity.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> InstanceRole {
        self.config.role
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    #[must_use]
    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    /// Latest worker responses. Only filled on main.
    #[must_use]
    pub fn status_board(&self) -> &Arc<WorkerStatusBoard> {
        &self.status_board
    }

    /// Broadcast a command to the fleet.
    pub async fn send_command(&self, command: CommandMessage) -> Result<(), BusError> {
        self.publisher.publish_command(command).await
    }

    /// Resolves to `true` once a stop was requested (e.g. by `stopWorker`).
    #[must_use]
    pub fn stop_requested(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    pub fn request_stop(&self) {
        self.stop.send_replace(true);
    }

    /// Start receiving. Must be called inside a tokio runtime.
    pub fn start(&self) {
        self.subscriber.start();
    }

    /// Stop receiving, then close the publisher. Idempotent.
    pub async fn shutdown(&self) {
        self.subscriber.shutdown().await;
        self.publisher.shutdown().await;
        info!(role = %self.config.role, "Bus context shut down");
    }
}
