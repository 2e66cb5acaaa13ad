//! # Bus Configuration
//!
//! Everything the publisher and subscriber need to know about the process,
//! resolved once at startup.

use std::time::Duration;

use fleet_types::{ExecutionMode, InstanceId, InstanceRole};

use crate::channel::ChannelNames;
use crate::error::ConfigurationError;

/// Process-level bus settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub mode: ExecutionMode,
    pub role: InstanceRole,
    /// Required in queue mode. Never reassigned.
    pub identity: Option<InstanceId>,
    pub channels: ChannelNames,
    pub reconnect: ReconnectPolicy,
}

impl BusConfig {
    /// Single-process deployment. No transport connection is ever opened.
    #[must_use]
    pub fn regular(role: InstanceRole) -> Self {
        Self {
            mode: ExecutionMode::Regular,
            role,
            identity: None,
            channels: ChannelNames::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Multi-process deployment.
    #[must_use]
    pub fn queue(role: InstanceRole, identity: InstanceId) -> Self {
        Self {
            mode: ExecutionMode::Queue,
            role,
            identity: Some(identity),
            channels: ChannelNames::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_channels(mut self, channels: ChannelNames) -> Self {
        self.channels = channels;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// The instance id, or `MissingIdentity`.
    pub fn require_identity(&self) -> Result<&InstanceId, ConfigurationError> {
        self.identity
            .as_ref()
            .ok_or(ConfigurationError::MissingIdentity)
    }
}

/// Backoff between subscription attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay added at random (0.1 = up to 10%).
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(16));
        let delay = self.initial_delay.saturating_mul(factor).min(self.max_delay);

        // Add jitter to prevent thundering herd
        let jitter = rand::random::<f64>() * self.jitter.max(0.0);
        delay.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}
