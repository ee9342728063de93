//! Broker user records.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row persisted for every broker user this control plane created.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerUser {
    pub username: String,
    /// Hex SHA-256 of the generated password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Username plus the API key to hand back to the caller.
///
/// `api_key` is the plaintext password only when the user was created by the
/// current call; otherwise it carries a hint to use the password reset flow.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub username: String,
    pub api_key: String,
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub username: String,
    pub api_key: String,
}
