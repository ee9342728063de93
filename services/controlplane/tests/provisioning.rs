//! Adaptor registration, deletion and user provisioning against the in-memory broker.
mod common;

use common::{ADAPTOR, OWNER, harness, harness_with_adaptor, register_request};
use controlplane::ControlPlaneError;
use controlplane::model::DeleteAdaptorRequest;
use controlplane::store::RegistryStore;
use controlplane::users::{API_KEY_HINT, PASSWORD_LENGTH, hash_password};
use courier_mgmt::{BrokerAdmin, Faults};

fn delete_request(adaptor_id: &str) -> DeleteAdaptorRequest {
    DeleteAdaptorRequest {
        adaptor_id: adaptor_id.to_string(),
        owner: OWNER.to_string(),
        vhost: None,
    }
}

#[tokio::test]
async fn register_adaptor_creates_exchange_grant_and_fan_out() {
    let harness = harness().await;
    let registration = harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect("register");

    assert_eq!(registration.id, ADAPTOR);
    assert_eq!(registration.username, OWNER);
    assert_eq!(registration.api_key.len(), PASSWORD_LENGTH);
    assert_eq!(registration.vhost, harness.data_vhost());
    assert_eq!(registration.port, harness.settings().amqp_port);

    let exchange = harness
        .control_plane
        .get_adaptor(ADAPTOR, None)
        .await
        .expect("exchange");
    assert_eq!(exchange.kind, "topic");

    let bindings = harness
        .control_plane
        .list_adaptor_bindings(ADAPTOR, None)
        .await
        .expect("bindings");
    let pattern = format!("{ADAPTOR}/.*");
    let settings = harness.settings();
    for queue in [&settings.data_queue, &settings.latest_queue, &settings.auditing_queue] {
        assert_eq!(
            bindings.queues.routing_keys(queue),
            Some(&[pattern.clone()][..]),
            "queue {queue}"
        );
    }
    assert_eq!(
        bindings.queues.routing_keys(&settings.logs_queue),
        Some(
            &[
                format!("{ADAPTOR}.heartbeat"),
                format!("{ADAPTOR}.dataIssue"),
                format!("{ADAPTOR}.downstreamIssue"),
            ][..]
        )
    );

    let grant = harness
        .broker
        .get_user_permissions(&harness.data_vhost(), OWNER)
        .await
        .expect("grant");
    assert_eq!(grant.write.to_wire(), ADAPTOR);
    assert!(grant.read.is_empty());
    assert!(grant.configure.is_empty());
}

#[tokio::test]
async fn new_user_password_is_hashed_in_registry() {
    let harness = harness().await;
    let registration = harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect("register");
    let row = harness.store.get_broker_user(OWNER).await.expect("row");
    assert_eq!(row.password_hash, hash_password(&registration.api_key));
    assert_eq!(
        harness.broker.user_password(OWNER).await.as_deref(),
        Some(registration.api_key.as_str())
    );
}

#[tokio::test]
async fn existing_user_gets_reset_hint() {
    let harness = harness_with_adaptor().await;
    let second = harness
        .control_plane
        .register_adaptor(&register_request("org.com/abc/rs.example/other"))
        .await
        .expect("second adaptor");
    assert_eq!(second.api_key, API_KEY_HINT);

    let grant = harness
        .broker
        .get_user_permissions(&harness.data_vhost(), OWNER)
        .await
        .expect("grant");
    assert_eq!(
        grant.write.to_wire(),
        format!("{ADAPTOR}|org.com/abc/rs.example/other")
    );
}

#[tokio::test]
async fn existing_exchange_is_a_conflict_and_left_alone() {
    let harness = harness_with_adaptor().await;
    let grant_before = harness
        .broker
        .get_user_permissions(&harness.data_vhost(), OWNER)
        .await
        .expect("grant before");
    let err = harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect_err("duplicate");
    assert_eq!(err.code(), "exchange_exists");
    assert_eq!(err.status(), 409);

    harness
        .control_plane
        .get_adaptor(ADAPTOR, None)
        .await
        .expect("exchange kept");
    let bindings = harness
        .control_plane
        .list_adaptor_bindings(ADAPTOR, None)
        .await
        .expect("bindings");
    assert_eq!(bindings.queues.iter().count(), 4);

    let grant_after = harness
        .broker
        .get_user_permissions(&harness.data_vhost(), OWNER)
        .await
        .expect("grant after");
    assert_eq!(grant_after, grant_before);
}

#[tokio::test]
async fn failed_fan_out_bind_deletes_exchange() {
    let harness = harness().await;
    let auditing = harness.settings().auditing_queue.clone();
    harness.broker.fail_binds_to(&auditing).await;

    let err = harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect_err("bind failure");
    assert!(matches!(err, ControlPlaneError::Remote { .. }));

    let lookup = harness.control_plane.get_adaptor(ADAPTOR, None).await;
    assert!(matches!(lookup, Err(ControlPlaneError::NotFound(_))));

    // Bindings made before the failure went with the exchange.
    let data_queue = harness.settings().data_queue.clone();
    let existing = harness
        .broker
        .list_queue_bindings(&harness.data_vhost(), &data_queue)
        .await
        .expect("data queue");
    assert!(existing.is_empty());
}

#[tokio::test]
async fn failed_write_grant_deletes_exchange() {
    let harness = harness_with_adaptor().await;
    harness
        .broker
        .set_faults(Faults {
            set_permissions: true,
            ..Faults::default()
        })
        .await;

    let other = "org.com/abc/rs.example/other";
    let err = harness
        .control_plane
        .register_adaptor(&register_request(other))
        .await
        .expect_err("grant failure");
    assert_eq!(err.code(), "remote_error");
    assert!(matches!(
        harness.control_plane.get_adaptor(other, None).await,
        Err(ControlPlaneError::NotFound(_))
    ));
}

#[tokio::test]
async fn failed_compensation_keeps_original_error() {
    let harness = harness().await;
    let data_queue = harness.settings().data_queue.clone();
    let mut faults = Faults {
        delete_exchange: true,
        ..Faults::default()
    };
    faults.bind_to_queues.insert(data_queue);
    harness.broker.set_faults(faults).await;

    let err = harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect_err("bind failure");
    assert_eq!(err.to_response().message, "Queue binding failed");
    // The exchange could not be removed; it is left for the operator.
    harness
        .control_plane
        .get_adaptor(ADAPTOR, None)
        .await
        .expect("exchange left behind");
}

#[tokio::test]
async fn invalid_adaptor_id_is_rejected_before_remote_calls() {
    let harness = harness().await;
    for bad in ["", "org.com//group", "org.com/abc/", "org com/abc", "org.com/a#b"] {
        let err = harness
            .control_plane
            .register_adaptor(&register_request(bad))
            .await
            .expect_err(bad);
        assert_eq!(err.code(), "validation_error", "{bad}");
    }
    assert!(harness.broker.get_user(OWNER).await.is_err());
}

#[tokio::test]
async fn delete_adaptor_removes_exchange_and_revokes_write() {
    let harness = harness_with_adaptor().await;
    harness
        .control_plane
        .delete_adaptor(&delete_request(ADAPTOR))
        .await
        .expect("delete");

    assert!(matches!(
        harness.control_plane.get_adaptor(ADAPTOR, None).await,
        Err(ControlPlaneError::NotFound(_))
    ));
    let grant = harness
        .broker
        .get_user_permissions(&harness.data_vhost(), OWNER)
        .await
        .expect("grant");
    assert!(!grant.write.contains(ADAPTOR));
}

#[tokio::test]
async fn delete_missing_adaptor_is_not_found() {
    let harness = harness_with_adaptor().await;
    let err = harness
        .control_plane
        .delete_adaptor(&delete_request("org.com/abc/rs.example/missing"))
        .await
        .expect_err("missing");
    assert_eq!(err.status(), 404);

    let grant = harness
        .broker
        .get_user_permissions(&harness.data_vhost(), OWNER)
        .await
        .expect("grant");
    assert_eq!(grant.write.to_wire(), ADAPTOR);
}

#[tokio::test]
async fn delete_adaptor_tolerates_revoke_failure() {
    let harness = harness_with_adaptor().await;
    harness
        .broker
        .set_faults(Faults {
            set_permissions: true,
            ..Faults::default()
        })
        .await;
    harness
        .control_plane
        .delete_adaptor(&delete_request(ADAPTOR))
        .await
        .expect("delete succeeds");
    assert!(harness.control_plane.get_adaptor(ADAPTOR, None).await.is_err());
}

#[tokio::test]
async fn reset_password_updates_broker_and_registry() {
    let harness = harness_with_adaptor().await;
    let reset = harness
        .control_plane
        .reset_password(OWNER)
        .await
        .expect("reset");
    assert_eq!(reset.username, OWNER);
    assert_eq!(reset.api_key.len(), PASSWORD_LENGTH);
    assert_eq!(
        harness.broker.user_password(OWNER).await.as_deref(),
        Some(reset.api_key.as_str())
    );
    let row = harness.store.get_broker_user(OWNER).await.expect("row");
    assert_eq!(row.password_hash, hash_password(&reset.api_key));
}

#[tokio::test]
async fn reset_password_for_unknown_user_is_not_found() {
    let harness = harness().await;
    let err = harness
        .control_plane
        .reset_password("ghost@org.com")
        .await
        .expect_err("unknown");
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let harness = harness().await;
    let report = harness
        .control_plane
        .bootstrap_topology()
        .await
        .expect("second bootstrap");
    assert_eq!(report.len(), 8);
    assert!(report.iter().all(|entry| !entry.created));
    let vhosts = harness.broker.list_vhosts().await.expect("vhosts");
    assert!(vhosts.contains(&harness.data_vhost()));
}
