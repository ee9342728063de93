//! Routing keys and adaptor identifiers.
//!
//! # Purpose
//! Validates the `/`-delimited strings that name adaptors (exchanges) and the
//! routing keys subscriptions bind with.
//!
//! # Key invariants
//! - A subscription routing key has exactly [`ROUTING_KEY_SEGMENTS`] non-empty segments.
//! - The exchange of a routing key is the key with its last segment removed.
//! - Adaptor ids use a restricted charset and contain no empty segments.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ROUTING_KEY_SEGMENTS: usize = 5;

/// Suffix appended to an adaptor id to match every data routing key it emits.
pub const DATA_WILDCARD_SUFFIX: &str = "/.*";

/// A validated subscription routing key.
///
/// # Example
/// ```rust
/// use courier_authz::RoutingKey;
///
/// let key = RoutingKey::parse("org.com/abc/rs.example/group/sensor-1").unwrap();
/// assert_eq!(key.exchange(), "org.com/abc/rs.example/group");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoutingKey {
    raw: String,
    #[serde(skip)]
    exchange_end: usize,
}

impl RoutingKey {
    pub fn parse(raw: &str) -> AuthzResult<Self> {
        if raw.trim().is_empty() {
            return Err(AuthzError::InvalidRoutingKey(raw.to_string()));
        }
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() != ROUTING_KEY_SEGMENTS
            || segments.iter().any(|segment| segment.trim().is_empty())
        {
            return Err(AuthzError::InvalidRoutingKey(raw.to_string()));
        }
        let exchange_end = raw
            .rfind('/')
            .ok_or_else(|| AuthzError::InvalidRoutingKey(raw.to_string()))?;
        Ok(Self {
            raw: raw.to_string(),
            exchange_end,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn exchange(&self) -> &str {
        &self.raw[..self.exchange_end]
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for RoutingKey {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        Self::parse(value)
    }
}

impl<'de> Deserialize<'de> for RoutingKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identifier of an adaptor and of the exchange backing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AdaptorId(String);

impl AdaptorId {
    pub fn parse(raw: &str) -> AuthzResult<Self> {
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@' | '/'));
        if raw.is_empty() || !valid_chars || raw.split('/').any(str::is_empty) {
            return Err(AuthzError::InvalidResourceId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Routing key pattern matching all data published by this adaptor.
    pub fn data_pattern(&self) -> String {
        format!("{}{}", self.0, DATA_WILDCARD_SUFFIX)
    }

    /// Routing key for one of the adaptor's status channels, e.g. `.heartbeat`.
    pub fn status_key(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }
}

impl fmt::Display for AdaptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AdaptorId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
