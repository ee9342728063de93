//! Heartbeat routing over adaptor bindings.
mod common;

use common::{ADAPTOR, harness, harness_with_adaptor, register_request};
use controlplane::ControlPlaneError;
use controlplane::model::HeartbeatRequest;
use courier_mgmt::{BrokerAdmin, Faults};

fn heartbeat(adaptor_id: &str, status: &str) -> HeartbeatRequest {
    HeartbeatRequest {
        adaptor_id: adaptor_id.to_string(),
        status: status.to_string(),
        vhost: None,
    }
}

#[tokio::test]
async fn heartbeat_is_published_on_first_matching_key() {
    let harness = harness_with_adaptor().await;
    let route = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, "heartbeat"))
        .await
        .expect("heartbeat");
    assert_eq!(route.queue, harness.settings().logs_queue);
    assert_eq!(route.routing_key, format!("{ADAPTOR}.heartbeat"));

    let published = harness.broker.published().await;
    let message = published
        .iter()
        .find(|message| message.exchange == ADAPTOR)
        .expect("published on adaptor exchange");
    assert_eq!(message.routing_key, route.routing_key);
    let body: serde_json::Value = serde_json::from_slice(&message.body).expect("json body");
    assert_eq!(body, serde_json::json!({"id": ADAPTOR, "status": "heartbeat"}));
}

#[tokio::test]
async fn status_matches_by_substring() {
    let harness = harness_with_adaptor().await;
    let route = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, "downstream"))
        .await
        .expect("heartbeat");
    assert_eq!(route.routing_key, format!("{ADAPTOR}.downstreamIssue"));
}

#[tokio::test]
async fn queues_are_scanned_in_name_order() {
    let harness = harness_with_adaptor().await;
    // `.*` is contained in the data pattern bound to several queues; the
    // alphabetically first of them wins.
    let route = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, ".*"))
        .await
        .expect("heartbeat");
    let settings = harness.settings();
    let mut candidates = vec![
        settings.data_queue.clone(),
        settings.latest_queue.clone(),
        settings.auditing_queue.clone(),
    ];
    candidates.sort();
    assert_eq!(route.queue, candidates[0]);
}

#[tokio::test]
async fn empty_status_is_rejected_without_publishing() {
    let harness = harness_with_adaptor().await;
    let err = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, ""))
        .await
        .expect_err("empty status");
    assert_eq!(err.code(), "validation_error");
    assert!(harness.broker.published().await.is_empty());
}

#[tokio::test]
async fn unknown_adaptor_is_not_found() {
    let harness = harness().await;
    let err = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, "heartbeat"))
        .await
        .expect_err("unknown");
    assert!(matches!(err, ControlPlaneError::NotFound(_)));
}

#[tokio::test]
async fn exchange_without_bindings_reports_no_queue() {
    let harness = harness().await;
    harness
        .broker
        .create_exchange(&harness.data_vhost(), ADAPTOR)
        .await
        .expect("bare exchange");
    let err = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, "heartbeat"))
        .await
        .expect_err("no bindings");
    assert_eq!(err.code(), "not_found");
    assert!(err.to_string().contains("No queue bound"));
}

#[tokio::test]
async fn unmatched_status_names_first_mismatch() {
    let harness = harness_with_adaptor().await;
    let err = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, "nothing-like-this"))
        .await
        .expect_err("no match");
    assert_eq!(err.code(), "validation_error");
    assert!(err.to_string().starts_with("Routing key not matched: "));
    assert!(err.to_string().contains(ADAPTOR));
    assert!(harness.broker.published().await.is_empty());
}

#[tokio::test]
async fn publish_failure_is_remote_error() {
    let harness = harness().await;
    harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect("register");
    harness
        .broker
        .set_faults(Faults {
            publish: true,
            ..Faults::default()
        })
        .await;
    let err = harness
        .control_plane
        .publish_heartbeat(&heartbeat(ADAPTOR, "heartbeat"))
        .await
        .expect_err("publish failure");
    assert_eq!(err.status(), 502);
}
