//! Access-grant and routing primitives shared by the Courier control plane.
//!
//! # Purpose
//! Holds the pure, I/O-free pieces of the control plane: the permission grant
//! model and its add/delete algebra, plus validation of adaptor ids and
//! subscription routing keys.
//!
//! # How it fits
//! `courier-mgmt` serializes [`PermissionGrant`] values onto the broker management
//! API; the control-plane service uses [`update_permission`] semantics through
//! [`PermissionGrant::apply`] and validates every routing key with [`RoutingKey`].
//!
//! # Key invariants
//! - Grants are edited only through add/delete of a single resource id.
//! - Subscription routing keys have exactly five `/`-separated segments.
//!
//! # Examples
//! ```rust
//! use courier_authz::{PermissionGrant, PermissionOp};
//!
//! let mut grant = PermissionGrant::deny_all();
//! grant.apply(PermissionOp::AddWrite, "org.com/abc/rs/sensor-1");
//! assert_eq!(grant.write.to_wire(), "org.com/abc/rs/sensor-1");
//! ```

mod errors;
mod grant;
mod routing;

pub use errors::{AuthzError, AuthzResult};
pub use grant::{GrantSet, PermissionGrant, PermissionOp, Right, WILDCARD, update_permission};
pub use routing::{AdaptorId, DATA_WILDCARD_SUFFIX, ROUTING_KEY_SEGMENTS, RoutingKey};
