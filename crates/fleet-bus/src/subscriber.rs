//! # Subscriber
//!
//! Inbound side of the bus. One receive loop per channel:
//!
//! | Role   | `commands` | `worker-response` |
//! |--------|------------|-------------------|
//! | main   | yes        | yes               |
//! | worker | yes        | no                |
//!
//! In regular mode nothing is subscribed and no client is created.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! Disconnected ──start()──→ Connecting ──subscribed──→ Subscribed
//!                               ↑                          │
//!                               └──── stream ended ────────┘
//! ```
//!
//! A dropped subscription is re-established with exponential backoff.
//! Messages published while reconnecting are lost.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fleet_telemetry::{BUS_RECONNECTS, BUS_SUBSCRIBED};
use fleet_types::InstanceRole;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::{BusConfig, ReconnectPolicy};
use crate::dispatcher::Dispatcher;
use crate::error::{BusError, ConfigurationError};
use crate::registry::CommandRegistry;
use crate::transport::{ClientPurpose, PubSubClient, TransportProvider};

/// Connection state of the subscriber as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    /// At least one channel is not subscribed yet.
    Connecting,
    /// Every channel is subscribed.
    Subscribed,
}

/// Tracks which channels are live and publishes the aggregate state.
struct ConnectionTracker {
    live: Mutex<HashSet<Channel>>,
    total: usize,
    state: watch::Sender<SubscriberState>,
}

impl ConnectionTracker {
    fn new(total: usize) -> Self {
        let (state, _) = watch::channel(SubscriberState::Disconnected);
        Self {
            live: Mutex::new(HashSet::new()),
            total,
            state,
        }
    }

    fn mark_live(&self, channel: Channel) {
        let mut live = self.live.lock();
        live.insert(channel);
        BUS_SUBSCRIBED.with_label_values(&[channel.name()]).set(1);
        let state = if live.len() == self.total {
            SubscriberState::Subscribed
        } else {
            SubscriberState::Connecting
        };
        self.state.send_replace(state);
    }

    fn mark_lost(&self, channel: Channel) {
        let mut live = self.live.lock();
        live.remove(&channel);
        BUS_SUBSCRIBED.with_label_values(&[channel.name()]).set(0);
        self.state.send_replace(SubscriberState::Connecting);
    }

    fn stopped(&self) {
        let mut live = self.live.lock();
        for channel in live.drain() {
            BUS_SUBSCRIBED.with_label_values(&[channel.name()]).set(0);
        }
        self.state.send_replace(SubscriberState::Disconnected);
    }
}

/// Receives commands (and, on main, worker responses) and dispatches them.
pub struct Subscriber {
    role: InstanceRole,
    clients: Vec<(Channel, String, Arc<dyn PubSubClient>)>,
    dispatcher: Arc<Dispatcher>,
    reconnect: ReconnectPolicy,
    tracker: Arc<ConnectionTracker>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Subscriber {
    /// Create the subscriber. Creates one client per channel in queue mode;
    /// no I/O happens until [`Subscriber::start`].
    ///
    /// # Errors
    ///
    /// `MissingIdentity` in queue mode without an instance id, `RegistryRole`
    /// when the registry was built for the other role, or the provider's error.
    pub fn new(
        config: &BusConfig,
        provider: &dyn TransportProvider,
        registry: Arc<CommandRegistry>,
    ) -> Result<Self, BusError> {
        if registry.role() != config.role {
            return Err(ConfigurationError::RegistryRole {
                registry: registry.role(),
                process: config.role,
            }
            .into());
        }

        let mut clients = Vec::new();
        let identity = if config.mode.is_queue() {
            let identity = config.require_identity()?.clone();
            for channel in Self::channels_for(config.role) {
                let client = provider.create_client(ClientPurpose::Subscriber(*channel))?;
                clients.push((*channel, config.channels.resolve(*channel), client));
            }
            Some(identity)
        } else {
            debug!(mode = config.mode.as_str(), "Subscriber created without transport clients");
            None
        };

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            role: config.role,
            tracker: Arc::new(ConnectionTracker::new(clients.len())),
            clients,
            dispatcher: Arc::new(Dispatcher::new(identity, registry)),
            reconnect: config.reconnect,
            shutdown,
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        })
    }

    /// Channels a process of `role` listens on.
    #[must_use]
    pub fn channels_for(role: InstanceRole) -> &'static [Channel] {
        match role {
            InstanceRole::Main => &[Channel::Commands, Channel::WorkerResponse],
            InstanceRole::Worker => &[Channel::Commands],
        }
    }

    /// Channels this subscriber will listen on. Empty in regular mode.
    #[must_use]
    pub fn subscribed_channels(&self) -> Vec<Channel> {
        self.clients.iter().map(|(channel, _, _)| *channel).collect()
    }

    /// The client used for `channel`, if any.
    #[must_use]
    pub fn client(&self, channel: Channel) -> Option<Arc<dyn PubSubClient>> {
        self.clients
            .iter()
            .find(|(c, _, _)| *c == channel)
            .map(|(_, _, client)| client.clone())
    }

    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    #[must_use]
    pub fn state(&self) -> SubscriberState {
        *self.tracker.state.borrow()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SubscriberState> {
        self.tracker.state.subscribe()
    }

    /// Spawn the receive loops. Must be called inside a tokio runtime.
    ///
    /// Does nothing in regular mode, after shutdown, or when already started.
    pub fn start(&self) {
        if self.clients.is_empty() {
            debug!("No channels to subscribe");
            return;
        }
        if self.stopped.load(Ordering::SeqCst) {
            warn!("Subscriber already shut down, not starting");
            return;
        }

        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            debug!("Subscriber already started");
            return;
        }

        self.tracker.state.send_replace(SubscriberState::Connecting);

        for (channel, name, client) in &self.clients {
            let receive_loop = ReceiveLoop {
                channel: *channel,
                name: name.clone(),
                client: client.clone(),
                dispatcher: self.dispatcher.clone(),
                reconnect: self.reconnect,
                tracker: self.tracker.clone(),
                shutdown: self.shutdown.subscribe(),
            };
            tasks.push(tokio::spawn(receive_loop.run()));
        }

        info!(role = %self.role, channels = self.clients.len(), "Subscriber started");
    }

    /// Stop receiving. In-flight handlers finish first. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Receive loop ended abnormally");
            }
        }

        for (_, _, client) in &self.clients {
            client.disconnect().await;
        }

        self.tracker.stopped();
        info!(role = %self.role, "Subscriber shut down");
    }
}

struct ReceiveLoop {
    channel: Channel,
    name: String,
    client: Arc<dyn PubSubClient>,
    dispatcher: Arc<Dispatcher>,
    reconnect: ReconnectPolicy,
    tracker: Arc<ConnectionTracker>,
    shutdown: watch::Receiver<bool>,
}

impl ReceiveLoop {
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let subscribed = tokio::select! {
                _ = self.shutdown.changed() => break,
                result = self.client.subscribe(&self.name) => result,
            };

            let mut stream = match subscribed {
                Ok(stream) => {
                    attempt = 0;
                    self.tracker.mark_live(self.channel);
                    info!(channel = %self.name, "Receiving messages");
                    stream
                }
                Err(e) => {
                    warn!(channel = %self.name, attempt = attempt, error = %e, "Subscribe failed");
                    if !self.wait_before_retry(&mut attempt).await {
                        break;
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => return,
                    next = stream.next() => match next {
                        // Handlers run to completion, shutdown waits for them
                        Some(raw) => {
                            self.dispatcher.dispatch(self.channel, &raw).await;
                        }
                        None => break,
                    }
                }
            }

            warn!(channel = %self.name, "Subscription dropped, reconnecting");
            self.tracker.mark_lost(self.channel);
            BUS_RECONNECTS.with_label_values(&[self.channel.name()]).inc();

            if !self.wait_before_retry(&mut attempt).await {
                break;
            }
        }

        debug!(channel = %self.name, "Receive loop stopped");
    }

    /// Sleep for the next backoff delay. False if shutdown was requested.
    async fn wait_before_retry(&mut self, attempt: &mut u32) -> bool {
        let delay = self.reconnect.delay_for(*attempt);
        *attempt = attempt.saturating_add(1);
        debug!(channel = %self.name, delay_ms = delay.as_millis() as u64, "Waiting before resubscribe");

        tokio::select! {
            _ = self.shutdown.changed() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
