//! Permission grants and the add/delete algebra applied to them.
//!
//! # Purpose
//! Models a broker user's per-vhost grant as three ordered collections of
//! resource ids (configure, write, read) and implements the transform used to
//! grant or revoke access to a single resource.
//!
//! # How it fits
//! The management API stores each right as a regular expression built from a
//! `|`-separated alternation of resource ids. [`GrantSet`] keeps the ids as a list
//! and only renders the alternation when serialized, so callers never edit the
//! pipe-delimited string by hand.
//!
//! # Key invariants
//! - An empty grant matches nothing; a grant beginning with [`WILDCARD`] matches everything.
//! - Adding to a wildcard grant first strips the wildcard prefix.
//! - Deleting removes every entry equal to the resource id.
//! - Entries are never deduplicated: adding an id twice yields two entries.
//!
//! # Examples
//! ```rust
//! use courier_authz::{PermissionOp, update_permission};
//!
//! let granted = update_permission("a/b", PermissionOp::AddWrite, "c/d");
//! assert_eq!(granted, "a/b|c/d");
//! assert_eq!(update_permission(&granted, PermissionOp::DeleteWrite, "c/d"), "a/b");
//! ```
//!
//! # Common pitfalls
//! - Round-tripping an add then a delete only restores the original grant when the
//!   original neither starts with the wildcard nor already lists the id.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel regex granting access to every resource.
pub const WILDCARD: &str = ".*";

const SEPARATOR: char = '|';

/// The three rights a broker user can hold on a vhost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Right {
    Configure,
    Write,
    Read,
}

impl Right {
    pub fn as_str(self) -> &'static str {
        match self {
            Right::Configure => "configure",
            Right::Write => "write",
            Right::Read => "read",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grant or revoke of a single right on a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionOp {
    AddRead,
    AddWrite,
    DeleteRead,
    DeleteWrite,
}

impl PermissionOp {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionOp::AddRead => "ADD_READ",
            PermissionOp::AddWrite => "ADD_WRITE",
            PermissionOp::DeleteRead => "DELETE_READ",
            PermissionOp::DeleteWrite => "DELETE_WRITE",
        }
    }

    /// The right this op edits.
    pub fn right(self) -> Right {
        match self {
            PermissionOp::AddRead | PermissionOp::DeleteRead => Right::Read,
            PermissionOp::AddWrite | PermissionOp::DeleteWrite => Right::Write,
        }
    }

    pub fn is_grant(self) -> bool {
        matches!(self, PermissionOp::AddRead | PermissionOp::AddWrite)
    }
}

impl fmt::Display for PermissionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionOp {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        match value {
            "ADD_READ" => Ok(PermissionOp::AddRead),
            "ADD_WRITE" => Ok(PermissionOp::AddWrite),
            "DELETE_READ" => Ok(PermissionOp::DeleteRead),
            "DELETE_WRITE" => Ok(PermissionOp::DeleteWrite),
            other => Err(AuthzError::InvalidPermissionOp(other.to_string())),
        }
    }
}

/// Ordered collection of resource ids making up one right of a grant.
///
/// # Summary
/// Entries keep their original order and may repeat. The pipe-delimited wire
/// form is produced by [`GrantSet::to_wire`] and by the serde impls.
///
/// # Example
/// ```rust
/// use courier_authz::GrantSet;
///
/// let mut set = GrantSet::parse(".*");
/// assert!(set.is_wildcard());
/// set.add("org/abc/rs/sensor-1");
/// assert_eq!(set.to_wire(), "org/abc/rs/sensor-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GrantSet {
    entries: Vec<String>,
}

impl GrantSet {
    /// An empty grant, matching no resource.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A grant matching every resource.
    pub fn wildcard() -> Self {
        Self {
            entries: vec![WILDCARD.to_string()],
        }
    }

    /// Parse the management API's pipe-delimited form.
    ///
    /// Empty segments are preserved so that rendering the result reproduces the
    /// input exactly.
    pub fn parse(wire: &str) -> Self {
        if wire.is_empty() {
            return Self::empty();
        }
        Self {
            entries: wire.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.entries
            .first()
            .is_some_and(|first| first.starts_with(WILDCARD))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.entries.iter().any(|entry| entry == resource_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Append `resource_id`, dropping a leading wildcard first.
    pub fn add(&mut self, resource_id: &str) {
        if let Some(first) = self.entries.first_mut() {
            if first.starts_with(WILDCARD) {
                first.drain(..WILDCARD.len());
            }
        }
        // A bare wildcard leaves a single empty entry behind; treat it as no prior content.
        if self.entries.len() == 1 && self.entries[0].is_empty() {
            self.entries.clear();
        }
        self.entries.push(resource_id.to_string());
    }

    /// Remove every entry equal to `resource_id`.
    pub fn remove(&mut self, resource_id: &str) {
        self.entries.retain(|entry| entry != resource_id);
    }

    pub fn to_wire(&self) -> String {
        self.entries.join("|")
    }
}

impl fmt::Display for GrantSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<&str> for GrantSet {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for GrantSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for GrantSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = String::deserialize(deserializer)?;
        Ok(Self::parse(&wire))
    }
}

/// A user's full grant on one vhost.
///
/// # Summary
/// Serializes to the `{configure, write, read}` body accepted by the management
/// API; unknown fields such as `user` and `vhost` are ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(default)]
    pub configure: GrantSet,
    #[serde(default)]
    pub write: GrantSet,
    #[serde(default)]
    pub read: GrantSet,
}

impl PermissionGrant {
    /// Grant that denies every right.
    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn right(&self, right: Right) -> &GrantSet {
        match right {
            Right::Configure => &self.configure,
            Right::Write => &self.write,
            Right::Read => &self.read,
        }
    }

    fn right_mut(&mut self, right: Right) -> &mut GrantSet {
        match right {
            Right::Configure => &mut self.configure,
            Right::Write => &mut self.write,
            Right::Read => &mut self.read,
        }
    }

    /// Apply `op` for `resource_id` to the right the op targets.
    pub fn apply(&mut self, op: PermissionOp, resource_id: &str) {
        let set = self.right_mut(op.right());
        if op.is_grant() {
            set.add(resource_id);
        } else {
            set.remove(resource_id);
        }
    }
}

/// Compute the updated pipe-delimited grant for a single right.
///
/// # What it does
/// Parses `existing`, applies `op` for `resource_id` and renders the result.
/// The right named by `op` is not consulted; callers pick which string to pass.
pub fn update_permission(existing: &str, op: PermissionOp, resource_id: &str) -> String {
    let mut set = GrantSet::parse(existing);
    if op.is_grant() {
        set.add(resource_id);
    } else {
        set.remove(resource_id);
    }
    set.to_wire()
}
