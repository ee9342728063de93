//! Courier control-plane library crate.
//!
//! # Purpose
//! Provisions broker resources for adaptors and maintains consumer subscriptions,
//! keeping the broker and the relational registry consistent through per-call
//! sagas. [`app::ControlPlane`] is the facade every operation hangs off.
//!
//! # Notes
//! Operations are grouped by workflow: [`provisioning`] for adaptors,
//! [`subscriptions`] for streaming and callback consumers, [`heartbeat`] for
//! status routing, and [`users`] for broker credentials.
pub mod app;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod model;
pub mod observability;
pub mod provisioning;
pub mod saga;
pub mod store;
pub mod subscriptions;
pub mod users;

pub use app::{ControlPlane, build_state};
pub use error::{ControlPlaneError, ControlPlaneResult, ErrorResponse};
