//! Response DTOs for the web API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::datetime::to_rfc3339;
use crate::db::{User, UserWithStats};
use crate::file::{link_path, FileRecord};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Login and registration response.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Opaque refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: UserSummary,
}

/// Token refresh response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// User summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    /// Number of files owned.
    pub files_count: i64,
    /// Total bytes owned.
    pub total_size: i64,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl UserSummary {
    /// Summary of a user known to own nothing yet.
    pub fn new_account(user: User) -> Self {
        Self::from(UserWithStats {
            user,
            files_count: 0,
            total_size: 0,
        })
    }
}

impl From<UserWithStats> for UserSummary {
    fn from(stats: UserWithStats) -> Self {
        let user = stats.user;
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            is_admin: user.is_admin,
            files_count: stats.files_count,
            total_size: stats.total_size,
            created_at: to_rfc3339(&user.created_at),
            last_login: user.last_login.as_deref().map(to_rfc3339),
        }
    }
}

/// File summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    pub id: i64,
    pub owner_id: i64,
    /// Display name.
    pub original_name: String,
    /// Size in bytes.
    pub size: i64,
    pub comment: String,
    pub created_at: String,
    pub last_download_at: Option<String>,
    /// Public link token.
    pub special_link: String,
    /// Path of the public download endpoint for this file.
    pub link_url: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            owner_id: file.owner_id,
            original_name: file.original_name,
            size: file.size,
            comment: file.comment,
            created_at: to_rfc3339(&file.created_at),
            last_download_at: file.last_download_at.as_deref().map(to_rfc3339),
            link_url: link_path(&file.special_link),
            special_link: file.special_link,
        }
    }
}
