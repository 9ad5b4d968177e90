//! Account registration and login.

use tracing::{info, warn};

use super::password::{hash_password, verify_password, PasswordError};
use super::principal::Principal;
use super::validation::validate_account;
use crate::db::{DbPool, NewUser, User, UserRepository};
use crate::{CloudError, Result};

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

impl RegistrationRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            full_name: full_name.into(),
        }
    }
}

/// Register a regular account.
///
/// Validates the fields, hashes the password and creates the user; the
/// storage root is derived from the username at this point.
pub async fn register(pool: &DbPool, request: &RegistrationRequest) -> Result<User> {
    register_with_admin(pool, request, false).await
}

/// Register an account with an explicit administrator flag.
pub async fn register_with_admin(
    pool: &DbPool,
    request: &RegistrationRequest,
    is_admin: bool,
) -> Result<User> {
    validate_account(&request.username, &request.email, &request.full_name)?;
    let password_hash = hash_password(&request.password)?;

    let new_user = NewUser::new(
        &request.username,
        password_hash,
        &request.email,
        &request.full_name,
    )
    .with_admin(is_admin);
    let user = UserRepository::new(pool).create(&new_user).await?;

    info!(
        username = %user.username,
        user_id = user.id,
        is_admin = user.is_admin,
        "New user registered"
    );
    Ok(user)
}

/// Check a username and password.
///
/// An unknown username is `NotFound`; a wrong password is `Auth`.
pub async fn authenticate(pool: &DbPool, username: &str, password: &str) -> Result<User> {
    let repo = UserRepository::new(pool);
    let user = repo
        .get_by_username(username)
        .await?
        .ok_or_else(|| CloudError::NotFound("user".to_string()))?;

    match verify_password(password, &user.password) {
        Ok(()) => {}
        Err(PasswordError::VerificationFailed) => {
            warn!(username = %user.username, "Failed login attempt");
            return Err(CloudError::Auth("invalid password".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    if let Err(e) = repo.update_last_login(user.id).await {
        warn!(user_id = user.id, error = %e, "Failed to record last login");
    }
    Ok(user)
}

/// Load the current principal for a user id taken from a token.
///
/// A user that no longer exists is an `Auth` error, so deleted accounts and
/// revoked admin flags take effect on the next request.
pub async fn resolve_principal(pool: &DbPool, user_id: i64) -> Result<Principal> {
    UserRepository::new(pool)
        .get_by_id(user_id)
        .await?
        .map(Principal::from)
        .ok_or_else(|| CloudError::Auth("account no longer exists".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn request() -> RegistrationRequest {
        RegistrationRequest::new("alice", "password123", "alice@example.com", "Alice")
    }

    #[tokio::test]
    async fn test_register() {
        let db = Database::open_in_memory().await.unwrap();
        let user = register(db.pool(), &request()).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.storage_root, "user_alice");
        assert!(!user.is_admin);
        assert_ne!(user.password, "password123");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let db = Database::open_in_memory().await.unwrap();

        let mut bad = request();
        bad.username = "1bad".to_string();
        assert!(matches!(
            register(db.pool(), &bad).await,
            Err(CloudError::Validation(_))
        ));

        let mut bad = request();
        bad.password = "short".to_string();
        assert!(matches!(
            register(db.pool(), &bad).await,
            Err(CloudError::Validation(_))
        ));

        let mut bad = request();
        bad.email = "not-an-email".to_string();
        assert!(matches!(
            register(db.pool(), &bad).await,
            Err(CloudError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let db = Database::open_in_memory().await.unwrap();
        register(db.pool(), &request()).await.unwrap();
        assert!(matches!(
            register(db.pool(), &request()).await,
            Err(CloudError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = Database::open_in_memory().await.unwrap();
        register(db.pool(), &request()).await.unwrap();

        let user = authenticate(db.pool(), "alice", "password123").await.unwrap();
        assert!(user.last_login.is_none());
        let reloaded = UserRepository::new(db.pool())
            .get_by_id(user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_login.is_some());

        assert!(matches!(
            authenticate(db.pool(), "alice", "wrong-password").await,
            Err(CloudError::Auth(_))
        ));
        assert!(matches!(
            authenticate(db.pool(), "nobody", "password123").await,
            Err(CloudError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_principal() {
        let db = Database::open_in_memory().await.unwrap();
        let user = register_with_admin(db.pool(), &request(), true)
            .await
            .unwrap();

        let principal = resolve_principal(db.pool(), user.id).await.unwrap();
        assert_eq!(principal.user_id, user.id);
        assert!(principal.is_admin);
        assert_eq!(principal.storage_root, "user_alice");

        UserRepository::new(db.pool()).delete(user.id).await.unwrap();
        assert!(matches!(
            resolve_principal(db.pool(), user.id).await,
            Err(CloudError::Auth(_))
        ));
    }
}
