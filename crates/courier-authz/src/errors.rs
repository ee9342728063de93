use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),
    #[error("invalid routing key: {0}")]
    InvalidRoutingKey(String),
    #[error("invalid permission op: {0}")]
    InvalidPermissionOp(String),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
