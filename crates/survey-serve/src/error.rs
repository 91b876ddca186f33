//! API error types and response formatting.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use survey_core::ValidationErrors;
use survey_ingest::IntakeError;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body missing, not JSON, or not an object.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Body exceeds the configured limit.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Field validation failed.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Survey log I/O failed.
    #[error("storage error: {0}")]
    Storage(#[from] survey_ingest::Error),

    /// Internal server error (task join failure, etc.).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Malformed(msg) => Self::BadRequest(msg),
            IntakeError::Validation(errors) => Self::Validation(errors),
            IntakeError::Storage(e) => Self::Storage(e),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Field-level validation response body.
#[derive(Debug, Clone, Serialize)]
struct ValidationResponse<'a> {
    detail: &'static str,
    errors: &'a ValidationErrors,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone())),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                Some("Request body is too large".to_string()),
            ),
            Self::Validation(errors) => {
                let body = ValidationResponse {
                    detail: "Validation error",
                    errors,
                };
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            Self::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    Some("Failed to store submission".to_string()),
                )
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    Some("An internal error occurred".to_string()),
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
