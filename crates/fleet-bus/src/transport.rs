//! # Transport Ports
//!
//! The bus only needs broadcast pub/sub: publish a string to a named channel,
//! receive every string published to it after subscribing. Adapters live in
//! [`crate::memory`] and [`crate::redis_transport`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::channel::Channel;
use crate::error::TransportError;

/// Raw payloads delivered on one subscription. Ends when the connection drops.
pub type MessageStream = BoxStream<'static, String>;

/// What a client will be used for. Purely informational for adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientPurpose {
    Publisher,
    Subscriber(Channel),
}

impl fmt::Display for ClientPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publisher => f.write_str("publisher"),
            Self::Subscriber(channel) => write!(f, "subscriber:{channel}"),
        }
    }
}

/// A connection to the messaging backend.
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Publish `payload` on `channel`. Delivery is at-most-once.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError>;

    /// Start receiving messages published on `channel` from now on.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, TransportError>;

    /// Close the connection. Open streams end. Calling twice is harmless.
    async fn disconnect(&self);

    /// False once `disconnect` was called.
    fn is_connected(&self) -> bool;
}

/// Creates clients. Creating a client performs no I/O.
pub trait TransportProvider: Send + Sync {
    fn create_client(
        &self,
        purpose: ClientPurpose,
    ) -> Result<Arc<dyn PubSubClient>, TransportError>;
}
