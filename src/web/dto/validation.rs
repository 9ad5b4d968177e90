//! Validated JSON extraction and field validators for request DTOs.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::web::error::ApiError;

/// JSON body that has passed `validator` checks.
///
/// Malformed JSON is a `BAD_REQUEST`; field failures are a
/// `VALIDATION_ERROR` listing the messages per field.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;

        value.validate().map_err(ApiError::from_validation_errors)?;
        Ok(ValidatedJson(value))
    }
}

/// Reject control characters, including NUL.
pub fn no_control_chars(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(validator::ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Reject values that are empty once whitespace is trimmed.
pub fn not_empty_trimmed(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}
