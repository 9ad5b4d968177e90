//! User management.
//!
//! - List users (admins: everyone; others: only themselves)
//! - Get user detail (admins: anyone; others: only themselves)
//! - Create, update and delete accounts (admins only)
//!
//! Deleting a user removes their blobs best-effort and then the user row;
//! the file records go with it through the foreign key.

use tracing::{info, warn};

use crate::auth::validation::{validate_email, validate_full_name, validate_username};
use crate::auth::{hash_password, register_with_admin, Principal, RegistrationRequest};
use crate::db::{DbPool, UserRepository, UserUpdate, UserWithStats};
use crate::file::FileService;
use crate::{CloudError, Result};

/// Changes an administrator can make to an account.
///
/// `password` is plain text and hashed before it is stored.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

impl AccountUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn is_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = Some(is_admin);
        self
    }

    /// Validate the supplied fields and hash the password.
    fn into_user_update(self) -> Result<UserUpdate> {
        if let Some(ref username) = self.username {
            validate_username(username)?;
        }
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        if let Some(ref full_name) = self.full_name {
            validate_full_name(full_name)?;
        }
        let password = self.password.as_deref().map(hash_password).transpose()?;

        Ok(UserUpdate {
            password,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            is_admin: self.is_admin,
        })
    }
}

/// Admin service for user management.
pub struct UserAdminService<'a> {
    pool: &'a DbPool,
    files: &'a FileService,
}

impl<'a> UserAdminService<'a> {
    pub fn new(pool: &'a DbPool, files: &'a FileService) -> Self {
        Self { pool, files }
    }

    fn repo(&self) -> UserRepository<'a> {
        UserRepository::new(self.pool)
    }

    /// List users with their file statistics.
    ///
    /// Never a denial: non-admins get a list holding only themselves.
    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<UserWithStats>> {
        if principal.is_admin() {
            return self.repo().list_with_stats().await;
        }
        Ok(self
            .repo()
            .get_with_stats(principal.user_id)
            .await?
            .into_iter()
            .collect())
    }

    /// Get one user.
    ///
    /// Other users are invisible to non-admins, so they get `NotFound`.
    pub async fn get_user(&self, principal: &Principal, user_id: i64) -> Result<UserWithStats> {
        if !principal.is_admin() && principal.user_id != user_id {
            return Err(CloudError::NotFound("user".to_string()));
        }
        self.repo()
            .get_with_stats(user_id)
            .await?
            .ok_or_else(|| CloudError::NotFound("user".to_string()))
    }

    /// Create an account.
    pub async fn create_user(
        &self,
        principal: &Principal,
        request: &RegistrationRequest,
        is_admin: bool,
    ) -> Result<UserWithStats> {
        principal.require_admin()?;

        let user = register_with_admin(self.pool, request, is_admin).await?;
        info!(
            admin = %principal.username,
            user_id = user.id,
            "Account created by administrator"
        );
        Ok(UserWithStats {
            user,
            files_count: 0,
            total_size: 0,
        })
    }

    /// Update an account.
    ///
    /// An administrator cannot remove their own admin flag.
    pub async fn update_user(
        &self,
        principal: &Principal,
        user_id: i64,
        update: AccountUpdate,
    ) -> Result<UserWithStats> {
        principal.require_admin()?;
        if user_id == principal.user_id && update.is_admin == Some(false) {
            return Err(CloudError::Validation(
                "you cannot remove your own administrator privileges".to_string(),
            ));
        }

        let update = update.into_user_update()?;
        self.repo()
            .update(user_id, &update)
            .await?
            .ok_or_else(|| CloudError::NotFound("user".to_string()))?;

        info!(
            admin = %principal.username,
            user_id,
            is_admin = ?update.is_admin,
            password_reset = update.password.is_some(),
            "Account updated by administrator"
        );
        self.get_user(principal, user_id).await
    }

    /// Delete an account and everything it owns.
    ///
    /// Blob removal failures are logged and do not stop the deletion.
    /// An administrator cannot delete their own account.
    pub async fn delete_user(&self, principal: &Principal, user_id: i64) -> Result<()> {
        principal.require_admin()?;
        if user_id == principal.user_id {
            return Err(CloudError::Validation(
                "you cannot delete your own account".to_string(),
            ));
        }

        let user = self
            .repo()
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| CloudError::NotFound("user".to_string()))?;

        match self.files.purge_owner_blobs(user.id).await {
            Ok(0) => {}
            Ok(failures) => warn!(user_id, failures, "Some blobs could not be removed"),
            Err(e) => warn!(user_id, error = %e, "Failed to enumerate blobs for removal"),
        }

        if !self.repo().delete(user.id).await? {
            return Err(CloudError::NotFound("user".to_string()));
        }
        info!(
            admin = %principal.username,
            user_id,
            username = %user.username,
            "Account deleted by administrator"
        );
        Ok(())
    }
}
