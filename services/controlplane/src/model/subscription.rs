//! Streaming and callback subscription payloads.
//!
//! # Purpose
//! Defines the requests accepted by the subscription registry, the
//! responses it returns, the callback row stored in the registry, and the
//! notification published when callbacks change.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamingRequest {
    pub consumer: String,
    pub name: String,
    /// Routing keys to bind; validated one by one while binding.
    #[serde(default)]
    pub entities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppendStreamingRequest {
    pub subscription_id: String,
    #[serde(default)]
    pub entities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeleteStreamingRequest {
    pub subscription_id: String,
    pub consumer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamingSubscription {
    pub subscription_id: String,
    pub username: String,
    pub api_key: String,
    pub streaming_url: String,
    pub host: String,
    pub port: u16,
    pub vhost: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamingBindings {
    pub subscription_id: String,
    pub entities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    pub consumer: String,
    pub name: String,
    pub callback_url: String,
    #[serde(default)]
    pub entities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeleteCallbackRequest {
    pub consumer: String,
    pub name: String,
}

/// Row of the `callback_subscriptions` table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CallbackSubscription {
    pub subscription_id: String,
    pub callback_url: String,
    pub entities: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub frequency: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CallbackSummary {
    pub subscription_id: String,
    pub callback_url: String,
    pub entities: Vec<String>,
}

impl From<CallbackSubscription> for CallbackSummary {
    fn from(row: CallbackSubscription) -> Self {
        Self {
            subscription_id: row.subscription_id,
            callback_url: row.callback_url,
            entities: row.entities,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOp {
    Create,
    Update,
    Delete,
}

impl NotificationOp {
    /// Routing key the notification is published with.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationOp::Create => "create",
            NotificationOp::Update => "update",
            NotificationOp::Delete => "delete",
        }
    }
}

/// `{subscriptionID, operation}` event consumed by the callback dispatcher.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CallbackNotification {
    #[serde(rename = "subscriptionID")]
    pub subscription_id: String,
    pub operation: NotificationOp,
}

impl CallbackNotification {
    /// Wire body: the event JSON embedded as a string under `body`.
    pub fn to_message(&self) -> serde_json::Result<Vec<u8>> {
        let inner = serde_json::to_string(self)?;
        serde_json::to_vec(&serde_json::json!({ "body": inner }))
    }
}
