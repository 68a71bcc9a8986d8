use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeygateError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("update conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

pub type KeygateResult<T> = Result<T, KeygateError>;
