//! Broker administration seams.
//!
//! # Purpose
//! Defines the operations the control plane needs from the broker: resource
//! CRUD through the management API and a raw publish primitive.
//!
//! # Key invariants
//! - Each method performs at most one remote call and never retries.
//! - Creates report an existing resource as [`MgmtError::AlreadyExists`].
//! - Lookups and deletes report a missing resource as [`MgmtError::NotFound`].
//!
//! [`MgmtError::AlreadyExists`]: crate::MgmtError::AlreadyExists
//! [`MgmtError::NotFound`]: crate::MgmtError::NotFound
use crate::MgmtResult;
use crate::types::{ExchangeBindings, ExchangeInfo, UserInfo};
use async_trait::async_trait;
use courier_authz::PermissionGrant;

#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    async fn create_exchange(&self, vhost: &str, name: &str) -> MgmtResult<()>;
    async fn get_exchange(&self, vhost: &str, name: &str) -> MgmtResult<ExchangeInfo>;
    async fn delete_exchange(&self, vhost: &str, name: &str) -> MgmtResult<()>;
    async fn list_exchange_bindings(&self, vhost: &str, name: &str)
    -> MgmtResult<ExchangeBindings>;

    async fn create_queue(&self, vhost: &str, name: &str) -> MgmtResult<()>;
    async fn delete_queue(&self, vhost: &str, name: &str) -> MgmtResult<()>;
    /// Routing keys bound to `name`, excluding the default binding keyed by the queue name.
    async fn list_queue_bindings(&self, vhost: &str, name: &str) -> MgmtResult<Vec<String>>;

    async fn bind_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> MgmtResult<()>;
    async fn unbind_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> MgmtResult<()>;

    async fn get_user(&self, name: &str) -> MgmtResult<UserInfo>;
    async fn create_user(&self, name: &str, password: &str) -> MgmtResult<()>;
    async fn update_user_password(&self, name: &str, password: &str) -> MgmtResult<()>;

    async fn create_vhost(&self, name: &str) -> MgmtResult<()>;
    async fn delete_vhost(&self, name: &str) -> MgmtResult<()>;
    async fn list_vhosts(&self) -> MgmtResult<Vec<String>>;

    async fn get_user_permissions(&self, vhost: &str, user: &str) -> MgmtResult<PermissionGrant>;
    async fn set_user_permissions(
        &self,
        vhost: &str,
        user: &str,
        grant: &PermissionGrant,
    ) -> MgmtResult<()>;
}

/// Fire a single message at an exchange.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(
        &self,
        vhost: &str,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> MgmtResult<()>;
}
