//! Error types for survey submission handling.

use thiserror::Error;

use crate::submission::ValidationErrors;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a request body into a submission.
#[derive(Error, Debug)]
pub enum Error {
    /// The body was not well-formed structured data at all.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// One or more fields violate their constraints.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
