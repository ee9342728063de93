use thiserror::Error;

/// Failure of a single management API call.
#[derive(Debug, Error)]
pub enum MgmtError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unexpected status {status} from {path}")]
    UnexpectedStatus { path: String, status: u16 },
    #[error("invalid management url: {0}")]
    InvalidUrl(String),
    #[error("payload is not valid utf-8")]
    InvalidPayload,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl MgmtError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MgmtError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, MgmtError::AlreadyExists(_))
    }
}

pub type MgmtResult<T> = Result<T, MgmtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        assert!(MgmtError::NotFound("queue q".into()).is_not_found());
        assert!(MgmtError::AlreadyExists("exchange e".into()).is_conflict());
        let status = MgmtError::UnexpectedStatus {
            path: "/api/vhosts".into(),
            status: 500,
        };
        assert!(!status.is_not_found());
        assert!(!status.is_conflict());
        assert_eq!(status.to_string(), "unexpected status 500 from /api/vhosts");
    }
}
