//! API error handling for the MyCloud web API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::CloudError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Field-level validation error (400).
    ValidationError,
    /// Unauthorized (401).
    Unauthorized,
    /// Forbidden (403).
    Forbidden,
    /// Not found (404).
    NotFound,
    /// Registered file whose blob is gone (404).
    BlobMissing,
    /// Conflict (409).
    Conflict,
    /// Too many requests (429).
    TooManyRequests,
    /// Blob storage failure (500).
    StorageError,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound | ErrorCode::BlobMissing => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::StorageError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Field-level validation error details (only present for validation errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with field-level details.
    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyRequests, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a validation error with field-level details.
    pub fn validation(details: HashMap<String, Vec<String>>) -> Self {
        Self::with_details(ErrorCode::ValidationError, "Validation failed", details)
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details: HashMap<String, Vec<String>> = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        Self::validation(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<CloudError> for ApiError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Auth(msg) => ApiError::unauthorized(msg),
            CloudError::Forbidden(msg) => ApiError::forbidden(msg),
            CloudError::NotFound(_) => ApiError::not_found(err.to_string()),
            CloudError::Conflict(msg) => ApiError::conflict(msg),
            CloudError::Validation(msg) => ApiError::new(ErrorCode::ValidationError, msg),
            CloudError::BlobMissing(ref path) => {
                tracing::warn!(path = %path, "File content missing from storage");
                ApiError::new(ErrorCode::BlobMissing, "file content is not available")
            }
            CloudError::StorageWrite(_) | CloudError::Storage(_) | CloudError::Io(_) => {
                tracing::error!("Storage error: {}", err);
                ApiError::new(ErrorCode::StorageError, "A storage error occurred")
            }
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}
