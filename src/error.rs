//! Error types for MyCloud.

use thiserror::Error;

/// Common error type for MyCloud.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Database error.
    ///
    /// Errors from sqlx are converted automatically. Unique constraint
    /// violations are mapped to [`CloudError::Conflict`] by the repositories.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error (missing or invalid credential).
    #[error("authentication error: {0}")]
    Auth(String),

    /// The principal is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation (username, email, stored path, public link).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Writing a blob failed. No registry record exists for it.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// Blob read or delete failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The registry references a blob that is not on disk.
    #[error("blob missing: {0}")]
    BlobMissing(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for CloudError {
    fn from(e: sqlx::Error) -> Self {
        CloudError::Database(e.to_string())
    }
}

/// Result type alias for MyCloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
