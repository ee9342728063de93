//! In-memory broker implementing the management seams.
//!
//! # Purpose
//! Stands in for a live broker during local development and tests. State lives
//! in a single map set guarded by `tokio::sync::RwLock`.
//!
//! # Behaviour
//! - Vhosts are not enforced for exchanges and queues; `create_vhost` only feeds `list_vhosts`.
//! - Binds require both the exchange and the queue; duplicate binds are idempotent.
//! - Publishing requires the target exchange and records the message.
//! - Deleting an exchange or a queue drops the bindings that reference it.
//!
//! # Fault injection
//! [`Faults`] make selected calls fail with a `500` so compensation paths can be
//! exercised without a real broker.
use crate::admin::{BrokerAdmin, MessagePublisher};
use crate::types::{ExchangeBindings, ExchangeInfo, UserInfo};
use crate::{MgmtError, MgmtResult};
use async_trait::async_trait;
use courier_authz::PermissionGrant;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Calls that should fail on the next and every following attempt.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Binds whose destination queue is listed here fail.
    pub bind_to_queues: HashSet<String>,
    pub set_permissions: bool,
    pub publish: bool,
    pub delete_exchange: bool,
    pub delete_queue: bool,
}

/// A message accepted by [`InMemoryBroker::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub vhost: String,
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Binding {
    vhost: String,
    exchange: String,
    queue: String,
    routing_key: String,
}

#[derive(Debug, Default)]
struct BrokerState {
    vhosts: BTreeSet<String>,
    exchanges: BTreeMap<(String, String), ExchangeInfo>,
    queues: BTreeSet<(String, String)>,
    // Insertion order mirrors the order the broker reports bindings in.
    bindings: Vec<Binding>,
    users: BTreeMap<String, String>,
    permissions: BTreeMap<(String, String), PermissionGrant>,
    published: Vec<PublishedMessage>,
    faults: Faults,
}

fn injected(path: String) -> MgmtError {
    MgmtError::UnexpectedStatus { path, status: 500 }
}

fn key(vhost: &str, name: &str) -> (String, String) {
    (vhost.to_string(), name.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active fault set.
    pub async fn set_faults(&self, faults: Faults) {
        self.state.write().await.faults = faults;
    }

    pub async fn fail_binds_to(&self, queue: &str) {
        self.state
            .write()
            .await
            .faults
            .bind_to_queues
            .insert(queue.to_string());
    }

    pub async fn clear_faults(&self) {
        self.state.write().await.faults = Faults::default();
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.read().await.published.clone()
    }

    pub async fn user_password(&self, name: &str) -> Option<String> {
        self.state.read().await.users.get(name).cloned()
    }
}

#[async_trait]
impl BrokerAdmin for InMemoryBroker {
    async fn create_exchange(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.exchanges.contains_key(&key(vhost, name)) {
            return Err(MgmtError::AlreadyExists(format!("exchange {name}")));
        }
        state.exchanges.insert(
            key(vhost, name),
            ExchangeInfo {
                name: name.to_string(),
                vhost: vhost.to_string(),
                kind: "topic".to_string(),
                durable: true,
                auto_delete: false,
            },
        );
        Ok(())
    }

    async fn get_exchange(&self, vhost: &str, name: &str) -> MgmtResult<ExchangeInfo> {
        self.state
            .read()
            .await
            .exchanges
            .get(&key(vhost, name))
            .cloned()
            .ok_or_else(|| MgmtError::NotFound(format!("exchange {name}")))
    }

    async fn delete_exchange(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.faults.delete_exchange {
            return Err(injected(format!("/api/exchanges/{vhost}/{name}")));
        }
        if state.exchanges.remove(&key(vhost, name)).is_none() {
            return Err(MgmtError::NotFound(format!("exchange {name}")));
        }
        state
            .bindings
            .retain(|binding| !(binding.vhost == vhost && binding.exchange == name));
        Ok(())
    }

    async fn list_exchange_bindings(
        &self,
        vhost: &str,
        name: &str,
    ) -> MgmtResult<ExchangeBindings> {
        let state = self.state.read().await;
        if !state.exchanges.contains_key(&key(vhost, name)) {
            return Err(MgmtError::NotFound(format!("exchange {name}")));
        }
        let mut bindings = ExchangeBindings::new();
        for binding in state
            .bindings
            .iter()
            .filter(|binding| binding.vhost == vhost && binding.exchange == name)
        {
            bindings.push(binding.queue.clone(), binding.routing_key.clone());
        }
        Ok(bindings)
    }

    async fn create_queue(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if !state.queues.insert(key(vhost, name)) {
            return Err(MgmtError::AlreadyExists(format!("queue {name}")));
        }
        Ok(())
    }

    async fn delete_queue(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.faults.delete_queue {
            return Err(injected(format!("/api/queues/{vhost}/{name}")));
        }
        if !state.queues.remove(&key(vhost, name)) {
            return Err(MgmtError::NotFound(format!("queue {name}")));
        }
        state
            .bindings
            .retain(|binding| !(binding.vhost == vhost && binding.queue == name));
        Ok(())
    }

    async fn list_queue_bindings(&self, vhost: &str, name: &str) -> MgmtResult<Vec<String>> {
        let state = self.state.read().await;
        if !state.queues.contains(&key(vhost, name)) {
            return Err(MgmtError::NotFound(format!("queue {name}")));
        }
        Ok(state
            .bindings
            .iter()
            .filter(|binding| binding.vhost == vhost && binding.queue == name)
            .map(|binding| binding.routing_key.clone())
            .collect())
    }

    async fn bind_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.faults.bind_to_queues.contains(queue) {
            return Err(injected(format!("/api/bindings/{vhost}/e/{exchange}/q/{queue}")));
        }
        if !state.exchanges.contains_key(&key(vhost, exchange)) {
            return Err(MgmtError::NotFound(format!("exchange {exchange}")));
        }
        if !state.queues.contains(&key(vhost, queue)) {
            return Err(MgmtError::NotFound(format!("queue {queue}")));
        }
        let binding = Binding {
            vhost: vhost.to_string(),
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        Ok(())
    }

    async fn unbind_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        let before = state.bindings.len();
        state.bindings.retain(|binding| {
            !(binding.vhost == vhost
                && binding.exchange == exchange
                && binding.queue == queue
                && binding.routing_key == routing_key)
        });
        if state.bindings.len() == before {
            return Err(MgmtError::NotFound(format!("binding {exchange} -> {queue}")));
        }
        Ok(())
    }

    async fn get_user(&self, name: &str) -> MgmtResult<UserInfo> {
        let state = self.state.read().await;
        if state.users.contains_key(name) {
            Ok(UserInfo {
                name: name.to_string(),
            })
        } else {
            Err(MgmtError::NotFound(format!("user {name}")))
        }
    }

    async fn create_user(&self, name: &str, password: &str) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(name) {
            return Err(MgmtError::AlreadyExists(format!("user {name}")));
        }
        state.users.insert(name.to_string(), password.to_string());
        Ok(())
    }

    async fn update_user_password(&self, name: &str, password: &str) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        match state.users.get_mut(name) {
            Some(current) => {
                *current = password.to_string();
                Ok(())
            }
            None => Err(MgmtError::NotFound(format!("user {name}"))),
        }
    }

    async fn create_vhost(&self, name: &str) -> MgmtResult<()> {
        if !self.state.write().await.vhosts.insert(name.to_string()) {
            return Err(MgmtError::AlreadyExists(format!("vhost {name}")));
        }
        Ok(())
    }

    async fn delete_vhost(&self, name: &str) -> MgmtResult<()> {
        if !self.state.write().await.vhosts.remove(name) {
            return Err(MgmtError::NotFound(format!("vhost {name}")));
        }
        Ok(())
    }

    async fn list_vhosts(&self) -> MgmtResult<Vec<String>> {
        Ok(self.state.read().await.vhosts.iter().cloned().collect())
    }

    async fn get_user_permissions(&self, vhost: &str, user: &str) -> MgmtResult<PermissionGrant> {
        self.state
            .read()
            .await
            .permissions
            .get(&key(vhost, user))
            .cloned()
            .ok_or_else(|| MgmtError::NotFound(format!("permissions for {user} on {vhost}")))
    }

    async fn set_user_permissions(
        &self,
        vhost: &str,
        user: &str,
        grant: &PermissionGrant,
    ) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.faults.set_permissions {
            return Err(injected(format!("/api/permissions/{vhost}/{user}")));
        }
        if !state.users.contains_key(user) {
            return Err(MgmtError::NotFound(format!("user {user}")));
        }
        state.permissions.insert(key(vhost, user), grant.clone());
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(
        &self,
        vhost: &str,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> MgmtResult<()> {
        let mut state = self.state.write().await;
        if state.faults.publish {
            return Err(injected(format!("/api/exchanges/{vhost}/{exchange}/publish")));
        }
        if !state.exchanges.contains_key(&key(vhost, exchange)) {
            return Err(MgmtError::NotFound(format!("exchange {exchange}")));
        }
        state.published.push(PublishedMessage {
            vhost: vhost.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_authz::PermissionOp;

    #[tokio::test]
    async fn exchange_lifecycle_drops_bindings() {
        let broker = InMemoryBroker::new();
        broker.create_exchange("v", "ex").await.expect("exchange");
        broker.create_queue("v", "q").await.expect("queue");
        broker.bind_queue("v", "ex", "q", "ex/.*").await.expect("bind");
        broker.bind_queue("v", "ex", "q", "ex/.*").await.expect("rebind");

        let bindings = broker.list_exchange_bindings("v", "ex").await.expect("list");
        assert_eq!(bindings.routing_keys("q"), Some(&["ex/.*".to_string()][..]));

        assert!(broker.create_exchange("v", "ex").await.unwrap_err().is_conflict());
        broker.delete_exchange("v", "ex").await.expect("delete");
        assert!(broker.get_exchange("v", "ex").await.unwrap_err().is_not_found());
        assert!(broker.list_queue_bindings("v", "q").await.expect("queue").is_empty());
    }

    #[tokio::test]
    async fn bind_requires_both_ends() {
        let broker = InMemoryBroker::new();
        broker.create_queue("v", "q").await.expect("queue");
        let err = broker.bind_queue("v", "missing", "q", "k").await.unwrap_err();
        assert!(err.is_not_found());

        broker.create_exchange("v", "ex").await.expect("exchange");
        let err = broker.bind_queue("v", "ex", "nope", "k").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn faults_fail_selected_calls() {
        let broker = InMemoryBroker::new();
        broker.create_exchange("v", "ex").await.expect("exchange");
        broker.create_queue("v", "q").await.expect("queue");
        broker.create_user("u", "pw").await.expect("user");
        broker
            .set_faults(Faults {
                bind_to_queues: ["q".to_string()].into_iter().collect(),
                set_permissions: true,
                publish: true,
                ..Faults::default()
            })
            .await;

        assert!(matches!(
            broker.bind_queue("v", "ex", "q", "k").await,
            Err(MgmtError::UnexpectedStatus { status: 500, .. })
        ));
        let mut grant = PermissionGrant::deny_all();
        grant.apply(PermissionOp::AddWrite, "ex");
        assert!(broker.set_user_permissions("v", "u", &grant).await.is_err());
        assert!(broker.publish("v", "ex", "k", b"{}").await.is_err());

        broker.clear_faults().await;
        broker.bind_queue("v", "ex", "q", "k").await.expect("bind");
        broker.set_user_permissions("v", "u", &grant).await.expect("perms");
        broker.publish("v", "ex", "k", b"{}").await.expect("publish");
        assert_eq!(broker.published().await.len(), 1);
        assert_eq!(
            broker.get_user_permissions("v", "u").await.expect("grant"),
            grant
        );
    }

    #[tokio::test]
    async fn users_and_vhosts() {
        let broker = InMemoryBroker::new();
        broker.create_user("u", "one").await.expect("create");
        assert!(broker.create_user("u", "two").await.unwrap_err().is_conflict());
        broker.update_user_password("u", "two").await.expect("reset");
        assert_eq!(broker.user_password("u").await.as_deref(), Some("two"));
        assert!(broker.update_user_password("x", "p").await.unwrap_err().is_not_found());

        broker.create_vhost("b").await.expect("b");
        broker.create_vhost("a").await.expect("a");
        assert_eq!(broker.list_vhosts().await.expect("list"), vec!["a", "b"]);
        broker.delete_vhost("a").await.expect("delete");
        assert!(broker.delete_vhost("a").await.unwrap_err().is_not_found());
    }
}
