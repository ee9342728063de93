use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exchange as reported by `GET /api/exchanges/{vhost}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub name: String,
    #[serde(default)]
    pub vhost: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
}

/// One row of a management API bindings listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInfo {
    #[serde(default)]
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub destination_type: String,
    pub routing_key: String,
}

/// Bindings whose source is one exchange, grouped by destination queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeBindings(BTreeMap<String, Vec<String>>);

impl ExchangeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, queue: impl Into<String>, routing_key: impl Into<String>) {
        self.0
            .entry(queue.into())
            .or_default()
            .push(routing_key.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn routing_keys(&self, queue: &str) -> Option<&[String]> {
        self.0.get(queue).map(Vec::as_slice)
    }

    /// Queues in name order with their routing keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(queue, keys)| (queue.as_str(), keys.as_slice()))
    }
}

impl FromIterator<BindingInfo> for ExchangeBindings {
    fn from_iter<I: IntoIterator<Item = BindingInfo>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for binding in iter {
            if binding.destination_type.is_empty() || binding.destination_type == "queue" {
                bindings.push(binding.destination, binding.routing_key);
            }
        }
        bindings
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VhostInfo {
    pub name: String,
}

/// Queue declaration arguments applied to every queue this client creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueArguments {
    #[serde(rename = "x-message-ttl")]
    pub message_ttl_ms: u64,
    #[serde(rename = "x-max-length")]
    pub max_length: u64,
    #[serde(rename = "x-queue-mode")]
    pub queue_mode: String,
}

impl Default for QueueArguments {
    fn default() -> Self {
        Self {
            message_ttl_ms: 86_400_000,
            max_length: 10_000,
            queue_mode: "lazy".to_string(),
        }
    }
}
