//! File registry for MyCloud.
//!
//! Records are created only after their blob has been written. Apart from
//! the display name, the comment and the last-download timestamp, a record
//! never changes after creation.

use serde::Serialize;
use sqlx::QueryBuilder;
use tracing::debug;

use super::link::LinkToken;
use super::storage::BlobPath;
use crate::db::{unique_violation, DbPool};
use crate::{CloudError, Result};

/// Attempts at drawing an unused link token before giving up.
pub const MAX_LINK_ATTEMPTS: usize = 5;

const FILE_COLUMNS: &str = "id, owner_id, original_name, stored_path, size, comment, created_at,
        last_download_at, special_link";

/// A registered file.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub owner_id: i64,
    /// Display name, as uploaded or renamed.
    pub original_name: String,
    /// Blob path relative to the blob store root.
    pub stored_path: String,
    pub size: i64,
    pub comment: String,
    pub created_at: String,
    pub last_download_at: Option<String>,
    /// Public link token.
    pub special_link: String,
}

impl FileRecord {
    /// The validated blob path of this record.
    pub fn blob_path(&self) -> Result<BlobPath> {
        BlobPath::new(self.stored_path.clone())
    }
}

/// Data for registering an uploaded file.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub owner_id: i64,
    pub original_name: String,
    pub stored_path: BlobPath,
    pub size: i64,
    pub comment: String,
}

impl NewFile {
    pub fn new(
        owner_id: i64,
        original_name: impl Into<String>,
        stored_path: BlobPath,
        size: i64,
    ) -> Self {
        Self {
            owner_id,
            original_name: original_name.into(),
            stored_path,
            size,
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Editable fields of a file record.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub original_name: Option<String>,
    pub comment: Option<String>,
}

impl FileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.original_name.is_none() && self.comment.is_none()
    }
}

/// Repository for file records.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Register a file with a freshly generated public link.
    ///
    /// A link collision is retried with a new token up to
    /// [`MAX_LINK_ATTEMPTS`] times; a stored path collision fails at once.
    /// Both end in `Conflict`.
    pub async fn create(&self, new_file: &NewFile) -> Result<FileRecord> {
        self.create_with(new_file, LinkToken::generate).await
    }

    pub(crate) async fn create_with(
        &self,
        new_file: &NewFile,
        mut next_token: impl FnMut() -> LinkToken,
    ) -> Result<FileRecord> {
        let sql = format!(
            "INSERT INTO files (owner_id, original_name, stored_path, size, comment, special_link)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {FILE_COLUMNS}"
        );

        for attempt in 1..=MAX_LINK_ATTEMPTS {
            let token = next_token();
            let result = sqlx::query_as::<_, FileRecord>(&sql)
                .bind(new_file.owner_id)
                .bind(&new_file.original_name)
                .bind(new_file.stored_path.as_str())
                .bind(new_file.size)
                .bind(&new_file.comment)
                .bind(token.as_str())
                .fetch_one(self.pool)
                .await;

            match result {
                Ok(record) => return Ok(record),
                Err(e) => match unique_violation(&e) {
                    Some(msg) if msg.contains("files.special_link") => {
                        debug!(attempt, "Public link collision, retrying");
                    }
                    Some(msg) if msg.contains("files.stored_path") => {
                        return Err(CloudError::Conflict(format!(
                            "stored path already registered: {}",
                            new_file.stored_path
                        )));
                    }
                    Some(msg) => return Err(CloudError::Conflict(msg)),
                    None => return Err(CloudError::Database(e.to_string())),
                },
            }
        }

        Err(CloudError::Conflict(
            "could not allocate a unique public link".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
        let result = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(result)
    }

    pub async fn get_by_link(&self, token: &LinkToken) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE special_link = ?");
        let result = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(token.as_str())
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(result)
    }

    /// List a user's files, newest first.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE owner_id = ?
             ORDER BY created_at DESC, id DESC"
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(owner_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(files)
    }

    /// List every file, newest first. Callers enforce admin access.
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files ORDER BY created_at DESC, id DESC");
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(files)
    }

    /// Change the display name and/or comment in one statement.
    ///
    /// Returns None if the record does not exist.
    pub async fn update(&self, id: i64, update: &FileUpdate) -> Result<Option<FileRecord>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");
        if let Some(ref name) = update.original_name {
            separated.push("original_name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(ref comment) = update.comment {
            separated.push("comment = ");
            separated.push_bind_unseparated(comment);
        }
        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(format!(" RETURNING {FILE_COLUMNS}"));

        let record = query
            .build_query_as::<FileRecord>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(record)
    }

    /// Set the last-download timestamp to now.
    pub async fn touch_download(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE files SET last_download_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a record. Returns false if it did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Stored paths of all files owned by a user.
    pub async fn stored_paths_by_owner(&self, owner_id: i64) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar("SELECT stored_path FROM files WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(paths)
    }

    pub async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| CloudError::Database(e.to_string()))?;
        Ok(count)
    }
}
