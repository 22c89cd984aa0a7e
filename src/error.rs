/// Error types for the engagement core
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("account {0} cannot follow itself")]
    SelfFollow(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification preserved across the API boundary. External layers
/// map these onto their own status codes without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    SelfFollow,
    Conflict,
    InvalidInput,
    Internal,
}

impl EngagementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngagementError::NotFound(_) => ErrorKind::NotFound,
            EngagementError::Forbidden(_) => ErrorKind::Forbidden,
            EngagementError::SelfFollow(_) => ErrorKind::SelfFollow,
            EngagementError::Conflict(_) => ErrorKind::Conflict,
            EngagementError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngagementError::Config(_)
            | EngagementError::Database(_)
            | EngagementError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for core operations
pub type EngagementResult<T> = Result<T, EngagementError>;
