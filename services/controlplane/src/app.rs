//! Control-plane application wiring.
//!
//! # Purpose
//! Defines [`ControlPlane`], the shared state every operation runs against, and
//! builds it from configuration. Collaborators are injected as trait objects so
//! tests can swap in the in-memory broker and store.
use crate::config::{BrokerSettings, ControlPlaneConfig, StorageBackend};
use crate::store::RegistryStore;
use crate::store::memory::InMemoryStore;
use crate::store::postgres::PostgresStore;
use anyhow::{Context, Result};
use courier_mgmt::{BrokerAdmin, ManagementClient, MessagePublisher};
use std::sync::Arc;

#[derive(Clone)]
pub struct ControlPlane {
    pub(crate) broker: Arc<dyn BrokerAdmin>,
    pub(crate) publisher: Arc<dyn MessagePublisher>,
    pub(crate) store: Arc<dyn RegistryStore>,
    pub(crate) settings: Arc<BrokerSettings>,
}

impl ControlPlane {
    pub fn new(
        broker: Arc<dyn BrokerAdmin>,
        publisher: Arc<dyn MessagePublisher>,
        store: Arc<dyn RegistryStore>,
        settings: BrokerSettings,
    ) -> Self {
        Self {
            broker,
            publisher,
            store,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn RegistryStore {
        self.store.as_ref()
    }

    /// Vhost for an adaptor request, falling back to the configured data vhost.
    pub(crate) fn data_vhost_or(&self, vhost: Option<&str>) -> String {
        vhost
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.settings.data_vhost)
            .to_string()
    }
}

/// Build a [`ControlPlane`] backed by the management API and the configured store.
///
/// # Errors
/// - Invalid management URL.
/// - Postgres selected without a `postgres` section, or the connection fails.
pub async fn build_state(config: &ControlPlaneConfig) -> Result<ControlPlane> {
    let store: Arc<dyn RegistryStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(
                PostgresStore::connect(pg)
                    .await
                    .context("connect registry store")?,
            )
        }
    };
    tracing::info!(backend = store.backend_name(), durable = store.is_durable(), "registry store ready");

    let client = Arc::new(
        ManagementClient::new(config.management.to_client_config())
            .context("build management client")?,
    );
    Ok(ControlPlane::new(
        client.clone(),
        client,
        store,
        config.broker.clone(),
    ))
}
