//! Error types for Compliance Core.
//!
//! Defines a unified error type that maps cleanly to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for Compliance Core operations.
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComplianceError {
    /// Stable machine-readable code and HTTP status for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ComplianceError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ComplianceError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ComplianceError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ComplianceError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ComplianceError::Database(e) if is_constraint_violation(e) => {
                (StatusCode::BAD_REQUEST, "CONSTRAINT_VIOLATION")
            }
            ComplianceError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ComplianceError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            ComplianceError::Serialization(_) => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            ComplianceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn is_constraint_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation() || db.is_foreign_key_violation())
        .unwrap_or(false)
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ComplianceError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let (message, details) = match &self {
            ComplianceError::NotFound(msg)
            | ComplianceError::BadRequest(msg)
            | ComplianceError::Unauthorized(msg)
            | ComplianceError::Forbidden(msg) => (msg.clone(), None),
            ComplianceError::Database(e) if is_constraint_violation(e) => {
                tracing::warn!(error = %e, "Constraint violation");
                ("Resource conflicts with existing data".to_string(), None)
            }
            ComplianceError::Database(e) => {
                // Log the actual error but don't expose internals
                tracing::error!(error = %e, "Database error");
                ("A database error occurred".to_string(), None)
            }
            ComplianceError::Config(msg) => ("Configuration error".to_string(), Some(msg.clone())),
            ComplianceError::Serialization(e) => (
                "Failed to process request/response".to_string(),
                Some(e.to_string()),
            ),
            ComplianceError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for compliance operations.
pub type ComplianceResult<T> = Result<T, ComplianceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ComplianceError::NotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ComplianceError::Forbidden("x".into()).status_and_code().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ComplianceError::Database(sqlx::Error::RowNotFound)
                .status_and_code()
                .1,
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_internal_error_hides_message() {
        let response = ComplianceError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
