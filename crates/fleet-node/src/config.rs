//! # Node Configuration
//!
//! Command-line flags with environment fallbacks.
//!
//! | Flag | Env | Default |
//! |------|-----|---------|
//! | `--mode` | `FLEET_EXECUTIONS_MODE` | `regular` |
//! | `--role` | `FLEET_INSTANCE_ROLE` | `main` |
//! | `--instance-id` | `FLEET_INSTANCE_ID` | generated in queue mode |
//! | `--transport` | `FLEET_TRANSPORT` | `redis` |
//! | `--redis-url` | `FLEET_REDIS_URL` | `redis://127.0.0.1:6379` |
//! | `--channel-prefix` | `FLEET_CHANNEL_PREFIX` | `fleet` |

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use fleet_bus::{
    BusConfig, ChannelNames, InMemoryBroker, RedisTransport, ReconnectPolicy, TransportError,
    TransportProvider, DEFAULT_CHANNEL_PREFIX,
};
use fleet_types::{ExecutionMode, IdentityError, InstanceId, InstanceRole};
use thiserror::Error;

/// Messaging backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    Redis,
    /// In-process broker; only useful when main and workers share a process.
    Memory,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid instance id: {0}")]
    InvalidInstanceId(#[from] IdentityError),

    #[error("Queue mode over Redis requires FLEET_REDIS_URL")]
    MissingRedisUrl,

    #[error("Cannot build transport: {0}")]
    Transport(#[from] TransportError),
}

/// Complete node configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleet-node")]
#[command(about = "Main or worker process on the fleet command bus")]
#[command(version)]
pub struct NodeConfig {
    /// Execution mode: regular (single process) or queue (main plus workers)
    #[arg(long, env = "FLEET_EXECUTIONS_MODE", default_value = "regular")]
    pub mode: ExecutionMode,

    /// Role of this process: main or worker
    #[arg(long, env = "FLEET_INSTANCE_ROLE", default_value = "main")]
    pub role: InstanceRole,

    /// Identity on the bus. Generated when absent in queue mode
    #[arg(long, env = "FLEET_INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// Messaging backend
    #[arg(long, env = "FLEET_TRANSPORT", value_enum, default_value_t = TransportKind::Redis)]
    pub transport: TransportKind,

    /// Redis connection URL
    #[arg(long, env = "FLEET_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Namespace for channel names; empty for bare names
    #[arg(long, env = "FLEET_CHANNEL_PREFIX", default_value = DEFAULT_CHANNEL_PREFIX)]
    pub channel_prefix: String,
}

impl NodeConfig {
    /// Configuration for an in-memory deployment, used by tests and demos.
    #[must_use]
    pub fn in_memory(mode: ExecutionMode, role: InstanceRole, instance_id: Option<&str>) -> Self {
        Self {
            mode,
            role,
            instance_id: instance_id.map(str::to_string),
            transport: TransportKind::Memory,
            redis_url: String::new(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
        }
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.is_queue()
            && self.transport == TransportKind::Redis
            && self.redis_url.trim().is_empty()
        {
            return Err(ConfigError::MissingRedisUrl);
        }
        Ok(())
    }

    /// The configured identity, or a generated one in queue mode.
    ///
    /// A generated identity differs on every call; resolve it once.
    pub fn resolve_identity(&self) -> Result<Option<InstanceId>, ConfigError> {
        match (&self.instance_id, self.mode) {
            (Some(raw), _) => Ok(Some(InstanceId::new(raw.as_str())?)),
            (None, ExecutionMode::Queue) => Ok(Some(InstanceId::generate())),
            (None, ExecutionMode::Regular) => Ok(None),
        }
    }

    /// Settings consumed by the publisher and subscriber.
    pub fn bus_config(&self) -> Result<BusConfig, ConfigError> {
        Ok(BusConfig {
            mode: self.mode,
            role: self.role,
            identity: self.resolve_identity()?,
            channels: ChannelNames::new(self.channel_prefix.clone()),
            reconnect: ReconnectPolicy::default(),
        })
    }

    /// Build the transport provider. Performs no I/O.
    pub fn build_transport(&self) -> Result<Arc<dyn TransportProvider>, ConfigError> {
        match self.transport {
            TransportKind::Redis => Ok(Arc::new(RedisTransport::open(&self.redis_url)?)),
            TransportKind::Memory => Ok(Arc::new(InMemoryBroker::new())),
        }
    }
}
