//! In-memory implementation of the registry store.
//!
//! # Purpose
//! Implements [`RegistryStore`] with `HashMap`s guarded by `tokio::sync::RwLock`,
//! for local development, tests, and deployments that can lose registry state
//! on restart.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: write locks for mutations, read locks for reads.
//!
//! # Fault injection
//! [`InMemoryStore::fail_writes`] makes every mutation fail with
//! [`StoreError::Unexpected`], standing in for a database outage.
use super::{RegistryStore, StoreError, StoreResult};
use crate::model::{BrokerUser, CallbackSubscription};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// Broker users keyed by username.
    users: Arc<RwLock<HashMap<String, BrokerUser>>>,
    /// Callback rows keyed by subscription id.
    callbacks: Arc<RwLock<HashMap<String, CallbackSubscription>>>,
    failing_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "in-memory store rejecting writes"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn get_broker_user(&self, username: &str) -> StoreResult<BrokerUser> {
        self.users
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("broker user".into()))
    }

    async fn insert_broker_user(&self, user: BrokerUser) -> StoreResult<()> {
        self.check_writable()?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Conflict("broker user".into()));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn update_broker_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<()> {
        self.check_writable()?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound("broker user".into()))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn get_callback(&self, subscription_id: &str) -> StoreResult<CallbackSubscription> {
        self.callbacks
            .read()
            .await
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("callback subscription".into()))
    }

    async fn insert_callback(&self, row: CallbackSubscription) -> StoreResult<()> {
        self.check_writable()?;
        let mut callbacks = self.callbacks.write().await;
        if callbacks.contains_key(&row.subscription_id) {
            return Err(StoreError::Conflict("callback subscription".into()));
        }
        callbacks.insert(row.subscription_id.clone(), row);
        Ok(())
    }

    async fn update_callback_entities(
        &self,
        subscription_id: &str,
        entities: &[String],
    ) -> StoreResult<()> {
        self.check_writable()?;
        let mut callbacks = self.callbacks.write().await;
        let row = callbacks
            .get_mut(subscription_id)
            .ok_or_else(|| StoreError::NotFound("callback subscription".into()))?;
        row.entities = entities.to_vec();
        Ok(())
    }

    async fn delete_callback(&self, subscription_id: &str) -> StoreResult<()> {
        self.check_writable()?;
        match self.callbacks.write().await.remove(subscription_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound("callback subscription".into())),
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
