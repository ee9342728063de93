//! Shared fixtures for control-plane integration tests.
#![allow(dead_code)]

use controlplane::ControlPlane;
use controlplane::config::BrokerSettings;
use controlplane::model::RegisterAdaptorRequest;
use controlplane::store::memory::InMemoryStore;
use courier_mgmt::InMemoryBroker;
use std::sync::Arc;

pub const OWNER: &str = "owner@org.com";
pub const CONSUMER: &str = "consumer@org.com";
pub const ADAPTOR: &str = "org.com/abc/rs.example/group";

pub struct Harness {
    pub broker: Arc<InMemoryBroker>,
    pub store: Arc<InMemoryStore>,
    pub control_plane: ControlPlane,
}

impl Harness {
    pub fn settings(&self) -> &BrokerSettings {
        self.control_plane.settings()
    }

    pub fn data_vhost(&self) -> String {
        self.settings().data_vhost.clone()
    }
}

/// Control plane over an in-memory broker whose system topology is declared.
pub async fn harness() -> Harness {
    let broker = Arc::new(InMemoryBroker::new());
    let store = Arc::new(InMemoryStore::new());
    let control_plane = ControlPlane::new(
        broker.clone(),
        broker.clone(),
        store.clone(),
        BrokerSettings::default(),
    );
    control_plane
        .bootstrap_topology()
        .await
        .expect("bootstrap topology");
    Harness {
        broker,
        store,
        control_plane,
    }
}

pub fn register_request(adaptor_id: &str) -> RegisterAdaptorRequest {
    RegisterAdaptorRequest {
        adaptor_id: adaptor_id.to_string(),
        owner: OWNER.to_string(),
        vhost: None,
    }
}

/// Harness with [`ADAPTOR`] registered, so routing keys under it can be bound.
pub async fn harness_with_adaptor() -> Harness {
    let harness = harness().await;
    harness
        .control_plane
        .register_adaptor(&register_request(ADAPTOR))
        .await
        .expect("register adaptor");
    harness
}

pub fn entity(resource: &str) -> String {
    format!("{ADAPTOR}/{resource}")
}
