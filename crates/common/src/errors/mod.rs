//! Error types for RagForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for configuration, backend, and response failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

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

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    BackendError,
    MalformedResponse,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::BackendError => 8002,
            ErrorCode::MalformedResponse => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
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

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Configuration: a required backend identifier is missing
    #[error("{key} is not configured.")]
    Configuration { key: String },

    // External service errors
    #[error("Backend {backend} call failed: {message}")]
    Backend { backend: String, message: String },

    #[error("Backend {backend} returned a malformed response: {message}")]
    MalformedResponse { backend: String, message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a backend transport or status failure
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a response that could not be interpreted
    pub fn malformed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::MalformedResponse {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Backend { .. } => ErrorCode::BackendError,
            AppError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Backend { .. } | AppError::MalformedResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
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
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
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

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
