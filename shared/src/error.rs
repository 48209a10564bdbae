use crate::ids::InvalidIdentifier;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UserError>;

/// Outcomes of a user operation other than success
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid ID")]
    InvalidIdentifier,

    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    /// Driver, connection or timeout failure. The message is for logs only.
    #[error("store error: {0}")]
    Store(String),
}

impl UserError {
    pub fn store(msg: impl Into<String>) -> Self {
        UserError::Store(msg.into())
    }
}

impl From<InvalidIdentifier> for UserError {
    fn from(_: InvalidIdentifier) -> Self {
        UserError::InvalidIdentifier
    }
}
