//! # In-Memory Broker
//!
//! Single-process stand-in for the messaging backend, built on
//! `tokio::sync::broadcast`. Used by tests and by `--transport memory`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{future, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::transport::{ClientPurpose, MessageStream, PubSubClient, TransportProvider};
use crate::DEFAULT_CHANNEL_CAPACITY;

struct BrokerState {
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
    published: AtomicU64,
    clients_created: AtomicUsize,
    capacity: usize,
}

impl BrokerState {
    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        if let Some(sender) = self.channels.read().get(channel) {
            return sender.clone();
        }
        self.channels
            .write()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

/// Broadcast pub/sub inside one process.
///
/// Cloning shares the same channels.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(BrokerState {
                channels: RwLock::new(HashMap::new()),
                published: AtomicU64::new(0),
                clients_created: AtomicUsize::new(0),
                capacity,
            }),
        }
    }

    /// Live subscriptions on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .channels
            .read()
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total publish calls accepted.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.state.published.load(Ordering::Relaxed)
    }

    /// Clients handed out by `create_client`.
    #[must_use]
    pub fn clients_created(&self) -> usize {
        self.state.clients_created.load(Ordering::Relaxed)
    }

    /// Ends every open subscription on `channel`, as a dropped backend
    /// connection would. Later subscriptions work normally.
    pub fn sever(&self, channel: &str) {
        if self.state.channels.write().remove(channel).is_some() {
            debug!(channel = channel, "In-memory channel severed");
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.capacity
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportProvider for InMemoryBroker {
    fn create_client(
        &self,
        purpose: ClientPurpose,
    ) -> Result<Arc<dyn PubSubClient>, TransportError> {
        self.state.clients_created.fetch_add(1, Ordering::Relaxed);
        let (closed, _) = watch::channel(false);
        Ok(Arc::new(InMemoryClient {
            state: self.state.clone(),
            purpose,
            connected: AtomicBool::new(true),
            closed,
        }))
    }
}

/// A client of [`InMemoryBroker`].
pub struct InMemoryClient {
    state: Arc<BrokerState>,
    purpose: ClientPurpose,
    connected: AtomicBool,
    closed: watch::Sender<bool>,
}

impl InMemoryClient {
    #[must_use]
    pub fn purpose(&self) -> ClientPurpose {
        self.purpose
    }
}

#[async_trait]
impl PubSubClient for InMemoryClient {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        self.state.published.fetch_add(1, Ordering::Relaxed);

        match self.state.sender(channel).send(payload.to_string()) {
            Ok(receivers) => {
                trace!(channel = channel, receivers = receivers, "Message published");
            }
            Err(_) => {
                // Pub/sub semantics: nobody listening, message is dropped
                trace!(channel = channel, "Message dropped (no receivers)");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        let receiver = self.state.sender(channel).subscribe();
        let mut closed = self.closed.subscribe();
        let name = channel.to_string();

        debug!(channel = channel, purpose = %self.purpose, "In-memory subscription created");

        let stream = BroadcastStream::new(receiver)
            .filter_map(move |item| {
                future::ready(match item {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(channel = %name, error = %e, "Subscriber lagged, messages skipped");
                        None
                    }
                })
            })
            .take_until(async move {
                // Resolves on disconnect or when the client is dropped
                let _ = closed.wait_for(|closed| *closed).await;
            })
            .boxed();

        Ok(stream)
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.closed.send_replace(true);
            debug!(purpose = %self.purpose, "In-memory client disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
