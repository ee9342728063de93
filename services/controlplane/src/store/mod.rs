//! Relational registry behind the control plane.
//!
//! # Purpose
//! Persists the two pieces of state the broker cannot hold for us: broker
//! users created by this control plane (username plus password hash) and
//! callback subscriptions (id, callback URL, entities, validity window).
//!
//! # Notes
//! Backends: [`memory::InMemoryStore`] for development and tests,
//! [`postgres::PostgresStore`] for deployments.
use crate::model::{BrokerUser, CallbackSubscription};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get_broker_user(&self, username: &str) -> StoreResult<BrokerUser>;
    /// Fails with [`StoreError::Conflict`] when the username is already recorded.
    async fn insert_broker_user(&self, user: BrokerUser) -> StoreResult<()>;
    async fn update_broker_password(&self, username: &str, password_hash: &str)
    -> StoreResult<()>;

    async fn get_callback(&self, subscription_id: &str) -> StoreResult<CallbackSubscription>;
    /// Fails with [`StoreError::Conflict`] when the subscription id is already recorded.
    async fn insert_callback(&self, row: CallbackSubscription) -> StoreResult<()>;
    async fn update_callback_entities(
        &self,
        subscription_id: &str,
        entities: &[String],
    ) -> StoreResult<()>;
    async fn delete_callback(&self, subscription_id: &str) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
