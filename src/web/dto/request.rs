//! Request DTOs for the web API.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::validation::{no_control_chars, not_empty_trimmed};

/// Login request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Logout request.
///
/// Without a refresh token every session of the caller is revoked.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Token refresh request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Account registration request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 20))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(
        length(max = 150),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub full_name: String,
}

/// Account creation by an administrator.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 20))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(
        length(max = 150),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub full_name: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Account update by an administrator. Only supplied fields change.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 20))]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(
        length(max = 150),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

/// Rename and/or annotate a file.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFileRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_empty_trimmed"))]
    pub original_name: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// File listing filters. Honoured for administrators only.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    /// List this user's files instead of your own.
    pub user_id: Option<i64>,
    /// List every file.
    #[serde(default)]
    pub all: bool,
}
