//! Refresh token repository for JWT authentication.

use super::DbPool;
use crate::{CloudError, Result};

const TOKEN_COLUMNS: &str = "id, user_id, token, expires_at, created_at, revoked_at";

/// Refresh token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    /// Opaque token string handed to the client.
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
    /// Revocation timestamp (None while usable).
    pub revoked_at: Option<String>,
}

/// New refresh token for creation.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token: String,
    /// Expiry in SQLite datetime format (UTC).
    pub expires_at: String,
}

/// Repository for refresh token operations.
pub struct RefreshTokenRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RefreshTokenRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a new refresh token.
    pub async fn create(&self, new_token: &NewRefreshToken) -> Result<RefreshToken> {
        let sql = format!(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)
             RETURNING {TOKEN_COLUMNS}"
        );
        let token = sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(new_token.user_id)
            .bind(&new_token.token)
            .bind(&new_token.expires_at)
            .fetch_one(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(token)
    }

    /// Get a refresh token by token string, whatever its state.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token = ?");
        let result = sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get a token that is neither expired nor revoked.
    pub async fn get_valid_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens
             WHERE token = ? AND revoked_at IS NULL AND expires_at > datetime('now')"
        );
        let result = sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Revoke `old` and store `new` atomically.
    ///
    /// Returns None, without storing anything, if `old` was not valid. Two
    /// concurrent rotations of the same token cannot both succeed.
    pub async fn rotate(
        &self,
        old: &str,
        new_token: &NewRefreshToken,
    ) -> Result<Option<RefreshToken>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE token = ? AND user_id = ? AND revoked_at IS NULL
               AND expires_at > datetime('now')",
        )
        .bind(old)
        .bind(new_token.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| CloudError::Database(e.to_string()))?;

        if revoked.rows_affected() == 0 {
            return Ok(None);
        }

        let sql = format!(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)
             RETURNING {TOKEN_COLUMNS}"
        );
        let created = sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(new_token.user_id)
            .bind(&new_token.token)
            .bind(&new_token.expires_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(Some(created))
    }

    /// Revoke a single token belonging to `user_id`.
    pub async fn revoke(&self, user_id: i64, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE token = ? AND user_id = ? AND revoked_at IS NULL",
        )
        .bind(token)
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke all tokens for a user.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Delete expired and revoked tokens.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens
             WHERE expires_at < datetime('now') OR revoked_at IS NOT NULL",
        )
        .execute(self.pool)
        .await
        .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
