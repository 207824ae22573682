//! Error types for Aula services
//!
//! Every failure reaching a handler is an `AppError`, mapped to an HTTP
//! status and a machine readable `ErrorCode`.

use aula_reports::ReportError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,

    // Authentication errors (2xxx)
    Unauthorized,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,
    DivisionNotFound,
    AssignmentNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    MigrationError,

    // Internal errors (9xxx)
    InternalError,
    ReportError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::Forbidden => 3001,

            ErrorCode::NotFound => 4001,
            ErrorCode::DivisionNotFound => 4002,
            ErrorCode::AssignmentNotFound => 4003,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::MigrationError => 7004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ReportError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Division not found: {id}")]
    DivisionNotFound { id: String },

    #[error("No assignment for subject {subject_id} in division {division_id}")]
    AssignmentNotFound { division_id: String, subject_id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),
}

impl AppError {
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden { message: message.into() }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DivisionNotFound { .. } => ErrorCode::DivisionNotFound,
            AppError::AssignmentNotFound { .. } => ErrorCode::AssignmentNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Migration(_) => ErrorCode::MigrationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Report(_) => ErrorCode::ReportError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::MissingField { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::DivisionNotFound { .. }
            | AppError::AssignmentNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Migration(_)
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // Bad report input is the caller's fault
            AppError::Report(ReportError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            AppError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            AppError::MissingField { field } => Some(field.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails { code, message, field },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::DivisionNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::DivisionNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code().as_code(), 4002);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation("period must be 1 or 2", Some("cuatrimestre"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_report_errors() {
        let bad_input = AppError::from(ReportError::InvalidInput("empty name".into()));
        assert_eq!(bad_input.status_code(), StatusCode::BAD_REQUEST);

        let io = AppError::from(ReportError::Io(std::io::Error::other("disk")));
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.code(), ErrorCode::ReportError);
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        assert_eq!(AppError::ExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::AssignmentNotFound).unwrap();
        assert_eq!(json, "\"ASSIGNMENT_NOT_FOUND\"");
    }
}
