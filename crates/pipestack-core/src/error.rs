//! Error types for the declaration layer.

use thiserror::Error;

/// Result type alias for declaration operations.
pub type DeclareResult<T> = Result<T, DeclareError>;

/// Errors raised while declaring resources into a stack.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclareError {
    #[error("there is already a construct with id '{id}' in stack '{stack}'")]
    DuplicateId { stack: String, id: String },

    #[error("invalid construct id '{0}': must contain at least one ASCII letter or digit")]
    InvalidId(String),

    #[error("invalid {kind} '{id}': {reason}")]
    Validation {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource '{id}' is {actual}, expected {expected}")]
    KindMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("'{from}' references undeclared resource '{to}'")]
    DanglingReference { from: String, to: String },

    #[error("invalid ARN: {0}")]
    InvalidArn(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}
