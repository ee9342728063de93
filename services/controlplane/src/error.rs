//! Control-plane error taxonomy.
//!
//! # Purpose and responsibility
//! Every exposed operation returns [`ControlPlaneError`] on failure. Each variant
//! carries a stable `code` and an HTTP-equivalent status so the front end can
//! render a uniform [`ErrorResponse`] without inspecting messages.
//!
//! # Key invariants and assumptions
//! - Validation failures are raised before any remote call.
//! - Compensation never replaces the error that triggered it.
//! - Remote and persistence details are logged server-side; the response carries a short message.
use crate::store::StoreError;
use courier_authz::AuthzError;
use courier_mgmt::MgmtError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("subscription {0} already exists")]
    DuplicateSubscription(String),
    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: MgmtError,
    },
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: StoreError,
    },
}

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Error body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ControlPlaneError {
    pub fn validation(message: impl Into<String>) -> Self {
        ControlPlaneError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ControlPlaneError::NotFound(message.into())
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ControlPlaneError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn remote(context: impl Into<String>, source: MgmtError) -> Self {
        ControlPlaneError::Remote {
            context: context.into(),
            source,
        }
    }

    pub fn persistence(context: impl Into<String>, source: StoreError) -> Self {
        ControlPlaneError::Persistence {
            context: context.into(),
            source,
        }
    }

    /// Map a management API failure, keeping not-found and conflict as their own classes.
    pub fn from_mgmt(context: impl Into<String>, err: MgmtError) -> Self {
        match err {
            MgmtError::NotFound(what) => ControlPlaneError::NotFound(format!("{what} not found")),
            MgmtError::AlreadyExists(what) => {
                ControlPlaneError::conflict("already_exists", format!("{what} already exists"))
            }
            other => ControlPlaneError::remote(context, other),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ControlPlaneError::Validation(_) => "validation_error",
            ControlPlaneError::Conflict { code, .. } => *code,
            ControlPlaneError::NotFound(_) => "not_found",
            ControlPlaneError::DuplicateSubscription(_) => "duplicate_subscription",
            ControlPlaneError::Remote { .. } => "remote_error",
            ControlPlaneError::Persistence { .. } => "persistence_error",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ControlPlaneError::Validation(_) => 400,
            ControlPlaneError::Conflict { .. } | ControlPlaneError::DuplicateSubscription(_) => 409,
            ControlPlaneError::NotFound(_) => 404,
            ControlPlaneError::Remote { .. } => 502,
            ControlPlaneError::Persistence { .. } => 500,
        }
    }

    /// Build the caller-facing body, logging backend details for internal classes.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ControlPlaneError::Remote { context, source } => {
                tracing::error!(error = %source, %context, "broker management call failed");
                context.clone()
            }
            ControlPlaneError::Persistence { context, source } => {
                tracing::error!(error = ?source, %context, "registry storage error");
                context.clone()
            }
            other => other.to_string(),
        };
        ErrorResponse {
            code: self.code().to_string(),
            message,
        }
    }
}

impl From<AuthzError> for ControlPlaneError {
    fn from(err: AuthzError) -> Self {
        ControlPlaneError::Validation(err.to_string())
    }
}

impl From<StoreError> for ControlPlaneError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ControlPlaneError::NotFound(format!("{what} not found")),
            StoreError::Conflict(what) => {
                ControlPlaneError::conflict("already_exists", format!("{what} already exists"))
            }
            other => ControlPlaneError::persistence("registry storage failed", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_align() {
        let cases = vec![
            (ControlPlaneError::validation("bad"), "validation_error", 400),
            (
                ControlPlaneError::conflict("exchange_exists", "exists"),
                "exchange_exists",
                409,
            ),
            (ControlPlaneError::not_found("missing"), "not_found", 404),
            (
                ControlPlaneError::DuplicateSubscription("a/b/c".into()),
                "duplicate_subscription",
                409,
            ),
            (
                ControlPlaneError::remote("Binding failed", MgmtError::InvalidPayload),
                "remote_error",
                502,
            ),
            (
                ControlPlaneError::persistence(
                    "insert failed",
                    StoreError::Unexpected(anyhow::anyhow!("boom")),
                ),
                "persistence_error",
                500,
            ),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
            assert_eq!(err.to_response().code, code);
        }
    }

    #[test]
    fn internal_classes_hide_backend_detail() {
        let err = ControlPlaneError::persistence(
            "insert failed",
            StoreError::Unexpected(anyhow::anyhow!("password=hunter2")),
        );
        let body = err.to_response();
        assert_eq!(body.message, "insert failed");
    }

    #[test]
    fn mgmt_errors_keep_their_class() {
        let not_found = ControlPlaneError::from_mgmt("get", MgmtError::NotFound("exchange x".into()));
        assert!(matches!(not_found, ControlPlaneError::NotFound(_)));
        let conflict =
            ControlPlaneError::from_mgmt("create", MgmtError::AlreadyExists("queue q".into()));
        assert_eq!(conflict.code(), "already_exists");
        let remote = ControlPlaneError::from_mgmt(
            "create",
            MgmtError::UnexpectedStatus {
                path: "/api/queues".into(),
                status: 503,
            },
        );
        assert_eq!(remote.status(), 502);
    }

    #[test]
    fn authz_errors_are_validation() {
        let err: ControlPlaneError = AuthzError::InvalidRoutingKey("a/b".into()).into();
        assert_eq!(err.code(), "validation_error");
        assert!(err.to_string().contains("a/b"));
    }
}
