//! # Test Harness
//!
//! Runs several nodes in one process over a shared [`InMemoryBroker`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_bus::{
    BusConfig, Channel, ChannelNames, ClientPurpose, InMemoryBroker, ReconnectPolicy,
    SubscriberState, TransportProvider,
};
use fleet_node::{
    ActivationDisplay, BusContext, EventBusService, ExternalSecretsService, LicenseService,
    Services, WebhookService,
};
use fleet_types::{InstanceId, InstanceRole};
use parking_lot::Mutex;

/// Services that count what they were asked to do.
#[derive(Default)]
pub struct RecordingServices {
    pub license_reloads: AtomicUsize,
    pub secrets_reloads: AtomicUsize,
    pub fail_secrets: AtomicBool,
    pub event_bus_restarts: AtomicUsize,
    pub webhooks_added: Mutex<Vec<String>>,
    pub webhooks_removed: Mutex<Vec<String>>,
    pub activated: Mutex<Vec<String>>,
    pub deactivated: Mutex<Vec<String>>,
}

impl RecordingServices {
    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            license: self.clone(),
            external_secrets: self.clone(),
            webhooks: self.clone(),
            event_bus: self.clone(),
            display: self.clone(),
        }
    }

    pub fn license_reloads(&self) -> usize {
        self.license_reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LicenseService for RecordingServices {
    async fn reload(&self) -> anyhow::Result<()> {
        self.license_reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ExternalSecretsService for RecordingServices {
    async fn reload_providers(&self) -> anyhow::Result<()> {
        self.secrets_reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_secrets.load(Ordering::SeqCst) {
            anyhow::bail!("vault unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookService for RecordingServices {
    async fn add(&self, workflow_id: &str) -> anyhow::Result<()> {
        self.webhooks_added.lock().push(workflow_id.to_string());
        Ok(())
    }

    async fn remove(&self, workflow_id: &str) -> anyhow::Result<()> {
        self.webhooks_removed.lock().push(workflow_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl EventBusService for RecordingServices {
    async fn restart(&self) -> anyhow::Result<()> {
        self.event_bus_restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ActivationDisplay for RecordingServices {
    fn activated(&self, workflow_id: &str) {
        self.activated.lock().push(workflow_id.to_string());
    }

    fn deactivated(&self, workflow_id: &str) {
        self.deactivated.lock().push(workflow_id.to_string());
    }
}

/// One running node.
pub struct TestNode {
    pub context: BusContext,
    pub services: Arc<RecordingServices>,
}

impl TestNode {
    pub fn id(&self) -> InstanceId {
        self.context
            .identity()
            .cloned()
            .expect("queue-mode node has an identity")
    }
}

/// A broker plus helpers to start nodes on it.
#[derive(Default)]
pub struct Fleet {
    pub broker: InMemoryBroker,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a queue-mode node and wait until it is subscribed.
    pub async fn spawn(&self, role: InstanceRole, id: &str) -> TestNode {
        let services = Arc::new(RecordingServices::default());
        let config = BusConfig::queue(role, InstanceId::new(id).expect("valid id"))
            .with_reconnect(ReconnectPolicy {
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(50),
                jitter: 0.0,
            });

        let context = BusContext::new(config, &self.broker, services.services())
            .expect("context wiring");
        context.start();

        let mut state = context.subscriber().watch_state();
        tokio::time::timeout(
            Duration::from_secs(1),
            state.wait_for(|s| *s == SubscriberState::Subscribed),
        )
        .await
        .expect("node subscribed in time")
        .expect("state channel open");

        TestNode { context, services }
    }

    /// Publish a raw payload on `channel`, bypassing any publisher.
    pub async fn inject(&self, channel: Channel, raw: &str) {
        let client = self
            .broker
            .create_client(ClientPurpose::Publisher)
            .expect("client");
        client
            .publish(&ChannelNames::default().resolve(channel), raw)
            .await
            .expect("publish");
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Give receive loops time to drain what was published so far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
