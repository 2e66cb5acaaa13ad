//! # Command Flow
//!
//! A command published by one process is handled by every other process
//! that registered a handler, never by the publisher itself.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use fleet_bus::{Channel, ClientPurpose, TransportProvider};
    use fleet_types::{CommandMessage, CommandName, Envelope, InstanceId, InstanceRole};
    use futures::StreamExt;
    use serde_json::json;
    use tokio::time::timeout;

    use crate::harness::{eventually, settle, Fleet};

    // =============================================================================
    // SELF-DELIVERY
    // =============================================================================

    /// A (`abc`) publishes reloadLicense; B (`xyz`) reloads once, A never does.
    #[tokio::test]
    async fn test_reload_license_skips_publisher() {
        let fleet = Fleet::new();
        let a = fleet.spawn(InstanceRole::Main, "abc").await;
        let b = fleet.spawn(InstanceRole::Worker, "xyz").await;

        a.context
            .send_command(CommandMessage::new(CommandName::ReloadLicense))
            .await
            .unwrap();

        assert!(eventually(|| b.services.license_reloads() == 1).await);
        settle().await;
        assert_eq!(b.services.license_reloads(), 1);
        assert_eq!(a.services.license_reloads(), 0);

        a.context.shutdown().await;
        b.context.shutdown().await;
    }

    /// Two mains: the one that did not publish reloads.
    #[tokio::test]
    async fn test_other_main_handles_command() {
        let fleet = Fleet::new();
        let first = fleet.spawn(InstanceRole::Main, "main-1").await;
        let second = fleet.spawn(InstanceRole::Main, "main-2").await;

        first
            .context
            .send_command(CommandMessage::new(CommandName::ReloadExternalSecretsProviders))
            .await
            .unwrap();

        assert!(eventually(|| second.services.secrets_reloads.load(Ordering::SeqCst) == 1).await);
        settle().await;
        assert_eq!(first.services.secrets_reloads.load(Ordering::SeqCst), 0);

        first.context.shutdown().await;
        second.context.shutdown().await;
    }

    /// A spoofed senderId equal to the receiver's id is overwritten by the publisher.
    #[tokio::test]
    async fn test_sender_id_cannot_be_spoofed() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        let spoofed = CommandMessage::new(CommandName::ReloadLicense)
            .stamped(InstanceId::new("w1").unwrap());
        main.context.send_command(spoofed).await.unwrap();

        assert!(eventually(|| worker.services.license_reloads() == 1).await);

        main.context.shutdown().await;
        worker.context.shutdown().await;
    }

    // =============================================================================
    // TARGETING
    // =============================================================================

    #[tokio::test]
    async fn test_targeted_command_reaches_listed_workers_only() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let w1 = fleet.spawn(InstanceRole::Worker, "w1").await;
        let w2 = fleet.spawn(InstanceRole::Worker, "w2").await;

        main.context
            .send_command(
                CommandMessage::new(CommandName::RestartEventBus).with_targets(vec![w1.id()]),
            )
            .await
            .unwrap();

        assert!(eventually(|| w1.services.event_bus_restarts.load(Ordering::SeqCst) == 1).await);
        settle().await;
        assert_eq!(w2.services.event_bus_restarts.load(Ordering::SeqCst), 0);

        main.context.shutdown().await;
        w1.context.shutdown().await;
        w2.context.shutdown().await;
    }

    // =============================================================================
    // MAIN-SIDE HANDLERS
    // =============================================================================

    #[tokio::test]
    async fn test_webhook_commands_reach_other_main() {
        let fleet = Fleet::new();
        let leader = fleet.spawn(InstanceRole::Main, "leader").await;
        let follower = fleet.spawn(InstanceRole::Main, "follower").await;

        leader
            .context
            .send_command(
                CommandMessage::new(CommandName::AddWebhooks)
                    .with_payload(json!({"workflowId": "wf-1"})),
            )
            .await
            .unwrap();
        leader
            .context
            .send_command(
                CommandMessage::new(CommandName::RemoveWebhooks)
                    .with_payload(json!({"workflowId": "wf-2"})),
            )
            .await
            .unwrap();

        assert!(eventually(|| follower.services.webhooks_removed.lock().len() == 1).await);
        assert_eq!(*follower.services.webhooks_added.lock(), vec!["wf-1".to_string()]);
        assert_eq!(*follower.services.webhooks_removed.lock(), vec!["wf-2".to_string()]);
        assert!(leader.services.webhooks_added.lock().is_empty());

        leader.context.shutdown().await;
        follower.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_activation_display_commands() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;

        // Published by a process that is not on the fleet harness
        for (command, workflow) in [
            ("displayWorkflowActivation", "wf-on"),
            ("displayWorkflowDeactivation", "wf-off"),
        ] {
            let raw = json!({
                "__type": "command",
                "id": "0d9f2b7e-4a51-4c3e-8f0a-7b6c5d4e3f21",
                "ts": "2024-05-01T12:00:00Z",
                "command": command,
                "senderId": "editor-gateway",
                "payload": {"workflowId": workflow},
            });
            fleet.inject(Channel::Commands, &raw.to_string()).await;
        }

        assert!(eventually(|| main.services.deactivated.lock().len() == 1).await);
        assert_eq!(*main.services.activated.lock(), vec!["wf-on".to_string()]);
        assert_eq!(*main.services.deactivated.lock(), vec!["wf-off".to_string()]);

        main.context.shutdown().await;
    }

    /// Workers have no webhook handler; the command is dropped, not failed.
    #[tokio::test]
    async fn test_worker_ignores_main_only_commands() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        main.context
            .send_command(
                CommandMessage::new(CommandName::AddWebhooks)
                    .with_payload(json!({"workflowId": "wf-1"})),
            )
            .await
            .unwrap();
        settle().await;

        assert!(worker.services.webhooks_added.lock().is_empty());
        assert!(main.services.webhooks_added.lock().is_empty());

        // Still receiving afterwards
        main.context
            .send_command(CommandMessage::new(CommandName::ReloadLicense))
            .await
            .unwrap();
        assert!(eventually(|| worker.services.license_reloads() == 1).await);

        main.context.shutdown().await;
        worker.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_command_envelope_on_wire_is_stamped() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;

        let client = fleet
            .broker
            .create_client(ClientPurpose::Subscriber(Channel::Commands))
            .unwrap();
        let mut stream = client.subscribe("fleet.commands").await.unwrap();

        main.context
            .send_command(CommandMessage::new(CommandName::GetId))
            .await
            .unwrap();

        let raw = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("message in time")
            .expect("stream open");
        let envelope = Envelope::from_json(&raw).unwrap();
        assert_eq!(
            envelope.as_command().unwrap().sender_id.as_ref().map(InstanceId::as_str),
            Some("main")
        );

        main.context.shutdown().await;
    }
}
