use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub adaptor_id: String,
    pub status: String,
    #[serde(default)]
    pub vhost: Option<String>,
}

/// The binding a heartbeat was forwarded on.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HeartbeatRoute {
    pub queue: String,
    pub routing_key: String,
}
