//! Error types for the groups crate.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Errors that can occur in group and membership operations.
#[derive(Debug, Clone, Error)]
pub enum GroupError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The actor lacks the access level required for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The resource already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A required parameter was not supplied.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// One or more fields failed validation; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GroupError {
    /// HTTP status an API boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            GroupError::NotFound(_) => 404,
            GroupError::PermissionDenied(_) => 403,
            GroupError::AlreadyExists(_) => 409,
            GroupError::MissingParameter(_) => 400,
            GroupError::Validation(_) => 422,
            GroupError::Serialization(_) => 500,
        }
    }

    /// Field errors, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            GroupError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for GroupError {
    fn from(errors: ValidationErrors) -> Self {
        GroupError::Validation(errors)
    }
}

impl From<serde_yaml::Error> for GroupError {
    fn from(e: serde_yaml::Error) -> Self {
        GroupError::Serialization(e.to_string())
    }
}

/// Result type for group operations.
pub type Result<T> = std::result::Result<T, GroupError>;
