//! User repository for MyCloud.
//!
//! This module provides CRUD operations for users in the database.

use sqlx::QueryBuilder;
use tracing::debug;

use super::user::{NewUser, User, UserUpdate, UserWithStats};
use super::{unique_violation, DbPool};
use crate::{CloudError, Result};

const USER_COLUMNS: &str =
    "id, username, email, password, full_name, is_admin, storage_root, created_at, last_login";

/// Suffixed storage roots tried before giving up with `Conflict`.
const MAX_STORAGE_ROOT_ATTEMPTS: u32 = 100;

const USER_WITH_STATS_SELECT: &str = "SELECT u.id, u.username, u.email, u.password, u.full_name,
        u.is_admin, u.storage_root, u.created_at, u.last_login,
        COUNT(f.id) AS files_count, COALESCE(SUM(f.size), 0) AS total_size
     FROM users u LEFT JOIN files f ON f.owner_id = u.id";

fn map_write_error(e: sqlx::Error) -> CloudError {
    match unique_violation(&e) {
        Some(msg) if msg.contains("users.username") => {
            CloudError::Conflict("username already exists".to_string())
        }
        Some(msg) if msg.contains("users.email") => {
            CloudError::Conflict("email already exists".to_string())
        }
        Some(msg) if msg.contains("users.storage_root") => {
            CloudError::Conflict("storage root already in use".to_string())
        }
        Some(msg) => CloudError::Conflict(msg),
        None => CloudError::Database(e.to_string()),
    }
}

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Fails with `Conflict` if the username or email is taken. A storage
    /// root still held by a renamed account gets a numeric suffix
    /// (`user_alice_2`); usernames are alphanumeric, so a suffixed root never
    /// matches another user's plain one.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let mut storage_root = new_user.storage_root.clone();
        let mut attempt = 1;
        let id = loop {
            let result = sqlx::query(
                "INSERT INTO users (username, email, password, full_name, is_admin, storage_root)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password)
            .bind(&new_user.full_name)
            .bind(new_user.is_admin)
            .bind(&storage_root)
            .execute(self.pool)
            .await;

            match result {
                Ok(done) => break done.last_insert_rowid(),
                Err(e)
                    if attempt < MAX_STORAGE_ROOT_ATTEMPTS
                        && unique_violation(&e)
                            .is_some_and(|msg| msg.contains("users.storage_root")) =>
                {
                    attempt += 1;
                    storage_root = format!("{}_{attempt}", new_user.storage_root);
                    debug!(%storage_root, "Storage root taken, trying next");
                }
                Err(e) => return Err(map_write_error(e)),
            }
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CloudError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Update a user by ID.
    ///
    /// Only fields that are set in the update will be modified; the storage
    /// root is never touched. Returns the updated user, or None if not found.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref password) = update.password {
            separated.push("password = ");
            separated.push_bind_unseparated(password);
        }
        if let Some(ref username) = update.username {
            separated.push("username = ");
            separated.push_bind_unseparated(username);
        }
        if let Some(ref email) = update.email {
            separated.push("email = ");
            separated.push_bind_unseparated(email);
        }
        if let Some(ref full_name) = update.full_name {
            separated.push("full_name = ");
            separated.push_bind_unseparated(full_name);
        }
        if let Some(is_admin) = update.is_admin {
            separated.push("is_admin = ");
            separated.push_bind_unseparated(is_admin);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Update the last login timestamp for a user.
    pub async fn update_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a user by ID. Their file records are removed by cascade.
    ///
    /// Returns true if a user was deleted, false if not found.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// List all users ordered by username.
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(users)
    }

    /// Get a user with file count and total stored bytes.
    pub async fn get_with_stats(&self, id: i64) -> Result<Option<UserWithStats>> {
        let sql = format!("{USER_WITH_STATS_SELECT} WHERE u.id = ? GROUP BY u.id");
        let result = sqlx::query_as::<_, UserWithStats>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(result)
    }

    /// List all users with file statistics, ordered by username.
    pub async fn list_with_stats(&self) -> Result<Vec<UserWithStats>> {
        let sql = format!("{USER_WITH_STATS_SELECT} GROUP BY u.id ORDER BY u.username");
        let users = sqlx::query_as::<_, UserWithStats>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;

        Ok(users)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(count)
    }
}
