//! # Worker Responses
//!
//! Workers answer on the worker-response channel; only main listens there.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use fleet_bus::Channel;
    use fleet_types::{
        CommandMessage, CommandName, Envelope, InstanceId, InstanceRole, WorkerResponseMessage,
    };
    use serde_json::json;

    use crate::harness::{eventually, settle, Fleet};

    fn id(value: &str) -> InstanceId {
        InstanceId::new(value).unwrap()
    }

    /// Worker `w1` publishes a response; main's subscriber sees it, the other
    /// worker has no worker-response subscription at all.
    #[tokio::test]
    async fn test_only_main_receives_worker_responses() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let w1 = fleet.spawn(InstanceRole::Worker, "w1").await;
        let _w2 = fleet.spawn(InstanceRole::Worker, "w2").await;

        assert_eq!(fleet.broker.subscriber_count("fleet.worker-response"), 1);

        w1.context
            .publisher()
            .publish_worker_response(
                WorkerResponseMessage::new(id("w1"), CommandName::GetStatus)
                    .with_payload(json!({"workerId": "w1", "uptimeSecs": 7})),
            )
            .await
            .unwrap();

        let board = main.context.status_board().clone();
        assert!(eventually(|| board.latest(&id("w1")).is_some()).await);
        assert_eq!(board.len(), 1);
        assert!(w1.context.status_board().is_empty());

        main.context.shutdown().await;
        w1.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_status_round_trip() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let _w1 = fleet.spawn(InstanceRole::Worker, "w1").await;
        let _w2 = fleet.spawn(InstanceRole::Worker, "w2").await;

        main.context
            .send_command(CommandMessage::new(CommandName::GetStatus))
            .await
            .unwrap();

        let board = main.context.status_board().clone();
        assert!(eventually(|| board.len() == 2).await);

        let report = board.latest(&id("w2")).unwrap();
        assert_eq!(report.command, CommandName::GetStatus);
        let payload = report.payload.unwrap();
        assert_eq!(payload["workerId"], "w2");
        assert!(payload["uptimeSecs"].is_u64());
        assert!(payload["version"].is_string());

        main.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_targeted_get_id() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let _w1 = fleet.spawn(InstanceRole::Worker, "w1").await;
        let _w2 = fleet.spawn(InstanceRole::Worker, "w2").await;

        main.context
            .send_command(CommandMessage::new(CommandName::GetId).with_targets(vec![id("w2")]))
            .await
            .unwrap();

        let board = main.context.status_board().clone();
        assert!(eventually(|| board.latest(&id("w2")).is_some()).await);
        settle().await;
        assert!(board.latest(&id("w1")).is_none());
        assert_eq!(
            board.latest(&id("w2")).unwrap().payload,
            Some(json!({"workerId": "w2"}))
        );

        main.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_secrets_reload_reported_to_main() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;
        worker.services.fail_secrets.store(true, Ordering::SeqCst);

        main.context
            .send_command(CommandMessage::new(CommandName::ReloadExternalSecretsProviders))
            .await
            .unwrap();

        let board = main.context.status_board().clone();
        assert!(eventually(|| board.latest(&id("w1")).is_some()).await);
        assert_eq!(
            board.latest(&id("w1")).unwrap().payload,
            Some(json!({"success": false, "error": "vault unreachable"}))
        );
        // Main does not react to its own command
        assert_eq!(main.services.secrets_reloads.load(Ordering::SeqCst), 0);

        main.context.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_event_bus_answers() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;
        let worker = fleet.spawn(InstanceRole::Worker, "w1").await;

        main.context
            .send_command(CommandMessage::new(CommandName::RestartEventBus))
            .await
            .unwrap();

        let board = main.context.status_board().clone();
        assert!(eventually(|| board.latest(&id("w1")).is_some()).await);
        assert_eq!(worker.services.event_bus_restarts.load(Ordering::SeqCst), 1);
        assert_eq!(
            board.latest(&id("w1")).unwrap().payload,
            Some(json!({"success": true}))
        );

        main.context.shutdown().await;
    }

    /// A command envelope on the worker-response channel is not a response.
    #[tokio::test]
    async fn test_wrong_kind_on_response_channel_ignored() {
        let fleet = Fleet::new();
        let main = fleet.spawn(InstanceRole::Main, "main").await;

        let raw = Envelope::Command(
            CommandMessage::new(CommandName::GetStatus).stamped(id("w1")),
        )
        .to_json()
        .unwrap();
        fleet.inject(Channel::WorkerResponse, &raw).await;
        settle().await;

        assert!(main.context.status_board().is_empty());
        main.context.shutdown().await;
    }
}
