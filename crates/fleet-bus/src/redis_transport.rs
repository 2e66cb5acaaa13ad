//! # Redis Transport
//!
//! Redis pub/sub adapter. Publishing goes through one `ConnectionManager` per
//! client, which re-dials after the server drops the connection: the publish
//! that hit the broken connection fails, later ones go out on a fresh one.
//! Every subscription gets its own dedicated pub/sub connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{future, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{ClientPurpose, MessageStream, PubSubClient, TransportProvider};

const DIAL_BACKOFF_BASE: u64 = 2;
const DIAL_BACKOFF_FACTOR_MS: u64 = 50;
const DIAL_RETRIES: usize = 1;

/// Provider of Redis-backed clients.
pub struct RedisTransport {
    client: redis::Client,
}

impl RedisTransport {
    /// Parse `url`. Does not connect.
    pub fn open(url: &str) -> Result<Self, TransportError> {
        let client = redis::Client::open(url)
            .map_err(|e| TransportError::Connection(format!("Invalid Redis URL '{url}': {e}")))?;
        Ok(Self { client })
    }
}

impl TransportProvider for RedisTransport {
    fn create_client(
        &self,
        purpose: ClientPurpose,
    ) -> Result<Arc<dyn PubSubClient>, TransportError> {
        let (closed, _) = watch::channel(false);
        Ok(Arc::new(RedisPubSubClient {
            client: self.client.clone(),
            purpose,
            connection: OnceCell::new(),
            connected: AtomicBool::new(true),
            closed,
        }))
    }
}

/// One logical Redis client. Connections are opened on first use.
pub struct RedisPubSubClient {
    client: redis::Client,
    purpose: ClientPurpose,
    connection: OnceCell<ConnectionManager>,
    connected: AtomicBool,
    closed: watch::Sender<bool>,
}

impl RedisPubSubClient {
    /// The shared publish connection. A failed first dial is not cached.
    async fn connection(&self) -> Result<ConnectionManager, TransportError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                // One quick retry per dial; the caller decides whether to try again
                let connection = ConnectionManager::new_with_backoff(
                    self.client.clone(),
                    DIAL_BACKOFF_BASE,
                    DIAL_BACKOFF_FACTOR_MS,
                    DIAL_RETRIES,
                )
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;
                info!(purpose = %self.purpose, "Redis connection established");
                Ok::<_, TransportError>(connection)
            })
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl PubSubClient for RedisPubSubClient {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        let mut connection = self.connection().await?;
        let receivers: i64 = connection
            .publish(channel, payload)
            .await
            .map_err(|e| {
                if e.is_connection_dropped() || e.is_io_error() {
                    warn!(channel = channel, error = %e, "Redis publish connection lost, reconnecting");
                }
                TransportError::Publish {
                    channel: channel.to_string(),
                    reason: e.to_string(),
                }
            })?;

        debug!(channel = channel, receivers = receivers, "Message published to Redis");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        let subscribe_error = |e: redis::RedisError| TransportError::Subscribe {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        let mut pubsub = self.client.get_async_pubsub().await.map_err(subscribe_error)?;
        pubsub.subscribe(channel).await.map_err(subscribe_error)?;

        info!(channel = channel, purpose = %self.purpose, "Subscribed to Redis channel");

        let name = channel.to_string();
        let mut closed = self.closed.subscribe();
        let stream = pubsub
            .into_on_message()
            .filter_map(move |message| {
                future::ready(match message.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(channel = %name, error = %e, "Dropping non-text Redis payload");
                        None
                    }
                })
            })
            .take_until(async move {
                let _ = closed.wait_for(|closed| *closed).await;
            })
            .boxed();

        Ok(stream)
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            // Ends open subscriptions; their pub/sub connections drop with the streams
            self.closed.send_replace(true);
            info!(purpose = %self.purpose, "Redis client disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
