//! Broker management API client for the Courier control plane.
//!
//! # Purpose
//! Exposes the broker resource operations (exchanges, queues, bindings, users,
//! vhosts, permissions) behind the [`BrokerAdmin`] trait, the raw publish
//! primitive behind [`MessagePublisher`], and two implementations: the HTTP
//! [`ManagementClient`] and the [`InMemoryBroker`] used for development and tests.
//!
//! # Key invariants
//! - One remote call per operation; no retries.
//! - HTTP statuses are mapped to [`MgmtError`] variants in one place.
//! - Permission grants cross this boundary as [`courier_authz::PermissionGrant`]
//!   and are rendered to the pipe-delimited wire form only when serialized.

mod admin;
mod client;
mod error;
mod memory;
mod types;

pub use admin::{BrokerAdmin, MessagePublisher};
pub use client::{ManagementClient, ManagementConfig};
pub use error::{MgmtError, MgmtResult};
pub use memory::{Faults, InMemoryBroker, PublishedMessage};
pub use types::{BindingInfo, ExchangeBindings, ExchangeInfo, QueueArguments, UserInfo, VhostInfo};
