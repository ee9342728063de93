#![cfg(feature = "pg-tests")]
//! Postgres registry store tests.
//!
//! Run with `cargo test -p controlplane --features pg-tests` and
//! `COURIER_TEST_DATABASE_URL` (or `DATABASE_URL`) pointing at a scratch database.

use chrono::{SubsecRound, Utc};
use controlplane::config::PostgresConfig;
use controlplane::model::{BrokerUser, CallbackSubscription};
use controlplane::store::postgres::PostgresStore;
use controlplane::store::{RegistryStore, StoreError};
use serial_test::serial;
use std::sync::Arc;

static PG_STORE: tokio::sync::OnceCell<Arc<PostgresStore>> = tokio::sync::OnceCell::const_new();

async fn pg_store() -> Option<Arc<PostgresStore>> {
    let url = match std::env::var("COURIER_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping pg-tests: set COURIER_TEST_DATABASE_URL or DATABASE_URL");
            return None;
        }
    };
    let pg_cfg = PostgresConfig {
        url,
        max_connections: 5,
        connect_timeout_ms: 5_000,
        acquire_timeout_ms: 5_000,
    };
    let store = match PG_STORE
        .get_or_try_init(|| async {
            let store = PostgresStore::connect(&pg_cfg).await?;
            Ok::<_, StoreError>(Arc::new(store))
        })
        .await
    {
        Ok(store) => Arc::clone(store),
        Err(err) => {
            eprintln!("skipping pg-tests: connect postgres store failed: {err}");
            return None;
        }
    };
    if let Err(err) = sqlx::query("TRUNCATE broker_users, callback_subscriptions")
        .execute(store.pool())
        .await
    {
        eprintln!("skipping pg-tests: cannot reset tables: {err}");
        return None;
    }
    Some(store)
}

fn callback_row(id: &str) -> CallbackSubscription {
    // Postgres keeps microseconds; trim so round-tripped rows compare equal.
    let now = Utc::now().trunc_subsecs(6);
    CallbackSubscription {
        subscription_id: id.to_string(),
        callback_url: "https://hooks.org.com/in".to_string(),
        entities: vec!["org.com/abc/rs/group/sensor-1".to_string()],
        start_time: now,
        end_time: now,
        frequency: now,
    }
}

#[tokio::test]
#[serial]
async fn callback_rows_round_trip() {
    let Some(store) = pg_store().await else {
        return;
    };
    let row = callback_row("org.com/abc/hook");
    store.insert_callback(row.clone()).await.expect("insert");
    assert_eq!(store.get_callback(&row.subscription_id).await.expect("get"), row);

    assert!(matches!(
        store.insert_callback(row.clone()).await,
        Err(StoreError::Conflict(_))
    ));

    let entities = vec![
        "org.com/abc/rs/group/sensor-1".to_string(),
        "org.com/abc/rs/group/sensor-2".to_string(),
    ];
    store
        .update_callback_entities(&row.subscription_id, &entities)
        .await
        .expect("update");
    assert_eq!(
        store
            .get_callback(&row.subscription_id)
            .await
            .expect("get")
            .entities,
        entities
    );

    store
        .delete_callback(&row.subscription_id)
        .await
        .expect("delete");
    assert!(matches!(
        store.get_callback(&row.subscription_id).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_callback(&row.subscription_id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
#[serial]
async fn broker_users_are_unique() {
    let Some(store) = pg_store().await else {
        return;
    };
    let user = BrokerUser {
        username: "owner@org.com".to_string(),
        password_hash: "aa".to_string(),
        created_at: Utc::now().trunc_subsecs(6),
    };
    store.insert_broker_user(user.clone()).await.expect("insert");
    assert!(matches!(
        store.insert_broker_user(user.clone()).await,
        Err(StoreError::Conflict(_))
    ));
    store
        .update_broker_password(&user.username, "bb")
        .await
        .expect("update");
    assert_eq!(
        store
            .get_broker_user(&user.username)
            .await
            .expect("get")
            .password_hash,
        "bb"
    );
    assert!(matches!(
        store.update_broker_password("ghost", "cc").await,
        Err(StoreError::NotFound(_))
    ));
    store.health_check().await.expect("health");
    assert!(store.is_durable());
}
