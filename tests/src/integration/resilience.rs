//! # Resilience
//!
//! Per-message failures stay inside the receive loop; dropped subscriptions
//! come back; shutdown is clean and repeatable.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleet_bus::{Channel, SubscriberState, TransportError};
    use fleet_types::{CommandMessage, CommandName, InstanceRole};
    use serde_json::json;
    use tokio::time::timeout;

    use crate::harness::{eventually, settle, Fleet};

    #[tokio::test]
    async fn test_undecodable_messages_do_not_stop_the_loop() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        fleet.inject(Channel::Commands, "not json at all").await;
        fleet.inject(Channel::Commands, r#"{"id": "x"}"#).await;
        fleet.inject(Channel::Commands, r#"{"__type": "mystery", "id": "x", "ts": "y"}"#).await;
        fleet
            .inject(
                Channel::Commands,
                &json!({
                    "__type": "command",
                    "id": "5f0e3a9c-8d7b-4e2f-a1c6-0b9d8e7f6a54",
                    "ts": "2024-05-01T12:00:00Z",
                    "command": "commandFromTheFuture",
                    "senderId": "main",
                })
                .to_string(),
            )
            .await;

        main.context
            .send_command(CommandMessage::new(CommandName::ReloadLicense))
            .await
            .unwrap();

        assert!(eventually(|| worker.services.license_reloads() == 1).await);

        main.context.shutdown().await;
        worker.context.shutdown().await;
    }

    /// A payload of the wrong shape fails that invocation only.
    #[tokio::test]
    async fn test_invalid_payload_fails_invocation_only() {
        let fleet = Fleet::new();
        let leader = fleet.spawn(InstanceRole::Main, "leader").await;
        let follower = fleet.spawn(InstanceRole::Main, "follower").await;

        leader
            .context
            .send_command(
                CommandMessage::new(CommandName::AddWebhooks).with_payload(json!({"workflow": 1})),
            )
            .await
            .unwrap();
        leader
            .context
            .send_command(
                CommandMessage::new(CommandName::AddWebhooks)
                    .with_payload(json!({"workflowId": "wf-ok"})),
            )
            .await
            .unwrap();

        assert!(eventually(|| follower.services.webhooks_added.lock().len() == 1).await);
        assert_eq!(*follower.services.webhooks_added.lock(), vec!["wf-ok".to_string()]);

        leader.context.shutdown().await;
        follower.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_resubscribes_after_dropped_connection() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        fleet.broker.sever("fleet.commands");

        // Both nodes come back on the commands channel
        assert!(eventually(|| fleet.broker.subscriber_count("fleet.commands") == 2).await);
        let mut state = worker.context.subscriber().watch_state();
        timeout(
            Duration::from_secs(1),
            state.wait_for(|s| *s == SubscriberState::Subscribed),
        )
        .await
        .expect("resubscribed")
        .unwrap();

        main.context
            .send_command(CommandMessage::new(CommandName::ReloadLicense))
            .await
            .unwrap();
        assert!(eventually(|| worker.services.license_reloads() == 1).await);

        main.context.shutdown().await;
        worker.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_worker_requests_shutdown() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        let mut stop = worker.context.stop_requested();
        main.context
            .send_command(CommandMessage::new(CommandName::StopWorker))
            .await
            .unwrap();

        timeout(Duration::from_secs(1), stop.wait_for(|stop| *stop))
            .await
            .expect("stop requested")
            .unwrap();

        // Main registers no stopWorker handler and keeps running
        assert!(!*main.context.stop_requested().borrow());

        worker.context.shutdown().await;
        main.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_repeatable_and_final() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;

        main.context.shutdown().await;
        main.context.shutdown().await;

        assert_eq!(
            main.context.subscriber().state(),
            SubscriberState::Disconnected
        );
        assert_eq!(fleet.broker.subscriber_count("fleet.commands"), 0);

        let result = main
            .context
            .send_command(CommandMessage::new(CommandName::ReloadLicense))
            .await;
        assert!(matches!(
            result,
            Err(fleet_bus::BusError::Transport(TransportError::Closed))
        ));
    }

    /// Messages published after shutdown are not handled.
    #[tokio::test]
    async fn test_no_handling_after_shutdown() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        worker.context.shutdown().await;
        main.context
            .send_command(CommandMessage::new(CommandName::ReloadLicense))
            .await
            .unwrap();
        settle().await;

        assert_eq!(worker.services.license_reloads(), 0);
        main.context.shutdown().await;
    }
}
