//! # Channels
//!
//! The two well-known pub/sub channels and their namespaced wire names.

use std::fmt;

use crate::DEFAULT_CHANNEL_PREFIX;

/// Logical channels on the messaging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Control commands, broadcast to every process.
    Commands,
    /// Worker answers, consumed by main only.
    WorkerResponse,
}

impl Channel {
    /// Logical name, also used as a metrics label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::WorkerResponse => "worker-response",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps logical channels to backend channel names.
///
/// A prefix lets several deployments share one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    prefix: String,
}

impl ChannelNames {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend name of `channel`.
    #[must_use]
    pub fn resolve(&self, channel: Channel) -> String {
        if self.prefix.is_empty() {
            channel.name().to_string()
        } else {
            format!("{}.{}", self.prefix, channel.name())
        }
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_PREFIX)
    }
}
