//! Adaptor registration payloads.
use courier_mgmt::ExchangeBindings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RegisterAdaptorRequest {
    pub adaptor_id: String,
    pub owner: String,
    /// Defaults to the configured data vhost.
    #[serde(default)]
    pub vhost: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeleteAdaptorRequest {
    pub adaptor_id: String,
    pub owner: String,
    #[serde(default)]
    pub vhost: Option<String>,
}

/// Credentials and connection details returned by a successful registration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdaptorRegistration {
    pub username: String,
    pub api_key: String,
    pub id: String,
    pub url: String,
    pub port: u16,
    pub vhost: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdaptorBindings {
    pub adaptor_id: String,
    pub queues: ExchangeBindings,
}
