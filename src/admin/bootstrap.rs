//! Administrator bootstrap.

use tracing::info;

use crate::auth::{hash_password, register_with_admin, RegistrationRequest};
use crate::config::AdminConfig;
use crate::db::{DbPool, User, UserRepository, UserUpdate};
use crate::{CloudError, Result};

/// Make sure the configured administrator account exists.
///
/// Creates the account with the admin flag, or, if the username is already
/// taken, sets its admin flag and resets its password. Returns `None` when no
/// password is configured.
pub async fn ensure_admin(pool: &DbPool, config: &AdminConfig) -> Result<Option<User>> {
    if config.password.is_empty() {
        return Ok(None);
    }

    let repo = UserRepository::new(pool);
    if let Some(existing) = repo.get_by_username(&config.username).await? {
        let update = UserUpdate::new()
            .is_admin(true)
            .password(hash_password(&config.password)?);
        let user = repo
            .update(existing.id, &update)
            .await?
            .ok_or_else(|| CloudError::NotFound("user".to_string()))?;
        info!(username = %user.username, "Administrator account updated");
        return Ok(Some(user));
    }

    let request = RegistrationRequest::new(
        &config.username,
        &config.password,
        &config.email,
        &config.full_name,
    );
    let user = register_with_admin(pool, &request, true).await?;
    info!(username = %user.username, "Administrator account created");
    Ok(Some(user))
}
