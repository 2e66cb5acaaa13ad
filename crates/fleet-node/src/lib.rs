//! # Fleet Node Library
//!
//! The process runtime for main and worker instances. The `fleet-node`
//! binary is a thin shell around [`BusContext`].
//!
//! ## Modules
//!
//! - `config/` - CLI flags and environment fallbacks
//! - `context/` - explicit wiring of publisher, subscriber and registry
//! - `handlers/` - main-side and worker-side command handlers
//! - `services/` - ports for the operational services commands act on
//! - `status/` - latest worker responses, kept on main

pub mod config;
pub mod context;
pub mod handlers;
pub mod services;
pub mod status;

pub use config::{ConfigError, NodeConfig, TransportKind};
pub use context::{BusContext, ContextError};
pub use services::{
    ActivationDisplay, EventBusService, ExternalSecretsService, LicenseService, LoggingServices,
    Services, WebhookService,
};
pub use status::{WorkerReport, WorkerStatusBoard};
