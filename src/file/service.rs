//! File lifecycle service for MyCloud.
//!
//! Coordinates the blob store and the file registry:
//!
//! - Upload writes the blob first and registers it only after the write
//!   succeeded; a failed registration removes the blob again.
//! - Download resolves the record, checks the blob, streams it and records
//!   the download time (best-effort).
//! - Delete removes the blob best-effort, then always removes the record.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{info, instrument, warn, Span};

use super::link::LinkToken;
use super::metadata::{FileRecord, FileRepository, FileUpdate, NewFile};
use super::storage::{BlobPath, BlobStore, ByteStream};
use super::{display_name, validate_comment, DEFAULT_MAX_UPLOAD_SIZE};
use crate::auth::Principal;
use crate::db::DbPool;
use crate::{CloudError, Result};

/// Default deadline for a blob write or a blob read.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(300);

/// Which files a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileScope {
    /// The principal's own files.
    Own,
    /// Another user's files (admins only).
    User(i64),
    /// Every file (admins only).
    All,
}

/// A written blob that has not been registered yet.
///
/// Pass it to [`FileService::commit`] or [`FileService::discard`].
#[derive(Debug)]
#[must_use]
pub struct StagedUpload {
    owner_id: i64,
    original_name: String,
    path: BlobPath,
    size: u64,
}

impl StagedUpload {
    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }
}

/// An opened download: the record as resolved and the blob content.
pub struct Download {
    pub file: FileRecord,
    pub content: ByteStream<'static>,
}

/// File lifecycle service.
#[derive(Clone)]
pub struct FileService {
    pool: DbPool,
    store: Arc<dyn BlobStore>,
    max_upload_size: u64,
    io_timeout: Duration,
    span: Span,
}

impl FileService {
    /// Create a service with default limits and its own tracing span.
    pub fn new(pool: DbPool, store: Arc<dyn BlobStore>) -> Self {
        Self {
            pool,
            store,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            io_timeout: DEFAULT_IO_TIMEOUT,
            span: tracing::info_span!("file_service"),
        }
    }

    /// Parent span for all lifecycle operations.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    fn repo(&self) -> FileRepository<'_> {
        FileRepository::new(&self.pool)
    }

    /// Upload a file into the principal's storage root.
    pub async fn upload(
        &self,
        principal: &Principal,
        original_name: &str,
        data: ByteStream<'_>,
        comment: Option<&str>,
    ) -> Result<FileRecord> {
        if let Some(comment) = comment {
            validate_comment(comment)?;
        }
        let staged = self.stage(principal, original_name, data).await?;
        self.commit(staged, comment).await
    }

    /// Write the blob for an upload without registering it.
    ///
    /// Fails with `Validation` for a bad name or an oversized upload and with
    /// `StorageWrite` if the write fails or times out. Nothing is left on
    /// disk after a failure.
    #[instrument(parent = &self.span, skip_all, fields(user_id = principal.user_id))]
    pub async fn stage(
        &self,
        principal: &Principal,
        original_name: &str,
        data: ByteStream<'_>,
    ) -> Result<StagedUpload> {
        let original_name = display_name(original_name)?;
        let path = BlobPath::generate(&principal.storage_root, &original_name)?;

        let limit = self.max_upload_size;
        let exceeded = Arc::new(AtomicBool::new(false));
        let flag = exceeded.clone();
        let mut seen = 0u64;
        let limited = data
            .map(move |chunk| {
                let chunk = chunk?;
                seen += chunk.len() as u64;
                if seen > limit {
                    flag.store(true, Ordering::Relaxed);
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "upload exceeds size limit",
                    ));
                }
                Ok(chunk)
            })
            .boxed();

        let size = match timeout(self.io_timeout, self.store.write(&path, limited)).await {
            Ok(Ok(size)) => size,
            Ok(Err(_)) if exceeded.load(Ordering::Relaxed) => {
                return Err(CloudError::Validation(format!(
                    "file exceeds the maximum upload size of {limit} bytes"
                )));
            }
            Ok(Err(e @ (CloudError::StorageWrite(_) | CloudError::Conflict(_)))) => {
                warn!(path = %path, error = %e, "Blob write failed");
                return Err(e);
            }
            Ok(Err(e)) => {
                warn!(path = %path, error = %e, "Blob write failed");
                return Err(CloudError::StorageWrite(e.to_string()));
            }
            Err(_) => {
                self.remove_blob(&path).await;
                warn!(path = %path, "Blob write timed out");
                return Err(CloudError::StorageWrite("write timed out".to_string()));
            }
        };

        Ok(StagedUpload {
            owner_id: principal.user_id,
            original_name,
            path,
            size,
        })
    }

    /// Register a staged blob. On failure the blob is deleted.
    #[instrument(parent = &self.span, skip_all, fields(path = %staged.path))]
    pub async fn commit(&self, staged: StagedUpload, comment: Option<&str>) -> Result<FileRecord> {
        if let Some(comment) = comment {
            if let Err(e) = validate_comment(comment) {
                self.discard(staged).await;
                return Err(e);
            }
        }

        let size = match i64::try_from(staged.size) {
            Ok(size) => size,
            Err(_) => {
                self.discard(staged).await;
                return Err(CloudError::Validation("file too large".to_string()));
            }
        };
        let new_file = NewFile::new(
            staged.owner_id,
            staged.original_name.clone(),
            staged.path.clone(),
            size,
        )
        .with_comment(comment.unwrap_or_default());

        match self.repo().create(&new_file).await {
            Ok(file) => {
                info!(
                    file_id = file.id,
                    owner_id = file.owner_id,
                    size = file.size,
                    "File uploaded"
                );
                Ok(file)
            }
            Err(e) => {
                warn!(error = %e, "Registering upload failed, removing blob");
                self.discard(staged).await;
                Err(e)
            }
        }
    }

    /// Throw away a staged blob.
    pub async fn discard(&self, staged: StagedUpload) {
        self.remove_blob(&staged.path).await;
    }

    /// Get a file record the principal may access.
    pub async fn get(&self, principal: &Principal, id: i64) -> Result<FileRecord> {
        let file = self
            .repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CloudError::NotFound("file".to_string()))?;
        principal.require_owner_or_admin(&file)?;
        Ok(file)
    }

    /// List files, newest first.
    ///
    /// Scopes other than [`FileScope::Own`] are honoured for admins only;
    /// everyone else gets their own files.
    pub async fn list(&self, principal: &Principal, scope: FileScope) -> Result<Vec<FileRecord>> {
        let scope = if principal.is_admin() {
            scope
        } else {
            FileScope::Own
        };
        match scope {
            FileScope::Own => self.repo().list_by_owner(principal.user_id).await,
            FileScope::User(user_id) => self.repo().list_by_owner(user_id).await,
            FileScope::All => self.repo().list_all().await,
        }
    }

    /// Rename a file and/or change its comment.
    #[instrument(parent = &self.span, skip_all, fields(file_id = id, user_id = principal.user_id))]
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        update: FileUpdate,
    ) -> Result<FileRecord> {
        let update = FileUpdate {
            original_name: update
                .original_name
                .as_deref()
                .map(display_name)
                .transpose()?,
            comment: update.comment,
        };
        if let Some(ref comment) = update.comment {
            validate_comment(comment)?;
        }

        self.get(principal, id).await?;
        let file = self
            .repo()
            .update(id, &update)
            .await?
            .ok_or_else(|| CloudError::NotFound("file".to_string()))?;
        info!("File updated");
        Ok(file)
    }

    /// Download by id (owner or admin). Records the download time.
    #[instrument(parent = &self.span, skip_all, fields(file_id = id, user_id = principal.user_id))]
    pub async fn download(&self, principal: &Principal, id: i64) -> Result<Download> {
        let file = self.get(principal, id).await?;
        self.open(file, true).await
    }

    /// Open a file for inline viewing (owner or admin).
    ///
    /// Does not record a download.
    #[instrument(parent = &self.span, skip_all, fields(file_id = id, user_id = principal.user_id))]
    pub async fn view(&self, principal: &Principal, id: i64) -> Result<Download> {
        let file = self.get(principal, id).await?;
        self.open(file, false).await
    }

    /// Resolve a public link token to its file. No authorization applies.
    pub async fn resolve_link(&self, token: &str) -> Result<FileRecord> {
        let not_found = || CloudError::NotFound("file".to_string());
        let token = LinkToken::parse(token).ok_or_else(not_found)?;
        self.repo().get_by_link(&token).await?.ok_or_else(not_found)
    }

    /// Download through a public link. Possession of the token is the only
    /// credential.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn download_by_link(&self, token: &str) -> Result<Download> {
        let file = self.resolve_link(token).await?;
        self.open(file, true).await
    }

    async fn open(&self, file: FileRecord, record_download: bool) -> Result<Download> {
        let path = file.blob_path()?;

        if !self.store.exists(&path).await? {
            warn!(file_id = file.id, path = %path, "Registered file has no blob");
            return Err(CloudError::BlobMissing(path.to_string()));
        }

        let deadline = Instant::now() + self.io_timeout;
        let content = timeout_at(deadline, self.store.read(&path))
            .await
            .map_err(|_| CloudError::Storage("timed out opening blob".to_string()))??;
        let content = read_until(content, deadline);

        if record_download {
            match self.repo().touch_download(file.id).await {
                Ok(_) => {}
                Err(e) => warn!(file_id = file.id, error = %e, "Failed to record download time"),
            }
        }

        info!(file_id = file.id, record_download, "File opened for download");
        Ok(Download { file, content })
    }

    /// Delete a file (owner or admin).
    ///
    /// The blob is removed best-effort; the record is removed regardless. A
    /// second delete of the same id is `NotFound`.
    #[instrument(parent = &self.span, skip_all, fields(file_id = id, user_id = principal.user_id))]
    pub async fn delete(&self, principal: &Principal, id: i64) -> Result<()> {
        let file = self.get(principal, id).await?;

        match file.blob_path() {
            Ok(path) => self.remove_blob(&path).await,
            Err(e) => warn!(error = %e, "Stored path is invalid, skipping blob removal"),
        }

        if !self.repo().delete(id).await? {
            return Err(CloudError::NotFound("file".to_string()));
        }
        info!("File deleted");
        Ok(())
    }

    /// Remove the blobs of every file a user owns, best-effort.
    ///
    /// Records are left alone; they go with the user row. Returns the number
    /// of blobs that could not be removed.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn purge_owner_blobs(&self, owner_id: i64) -> Result<usize> {
        let mut failures = 0;
        for stored in self.repo().stored_paths_by_owner(owner_id).await? {
            let removed = match BlobPath::new(stored.clone()) {
                Ok(path) => self.store.delete(&path).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                warn!(path = %stored, error = %e, "Failed to remove blob");
                failures += 1;
            }
        }
        Ok(failures)
    }

    async fn remove_blob(&self, path: &BlobPath) {
        if let Err(e) = self.store.delete(path).await {
            warn!(path = %path, error = %e, "Failed to remove blob");
        }
    }
}

/// Bound a blob read by `deadline`.
///
/// Once it passes, the stream yields a `TimedOut` error and ends; the
/// underlying reader is dropped.
fn read_until(content: ByteStream<'static>, deadline: Instant) -> ByteStream<'static> {
    stream::unfold(Some(content), move |state| async move {
        let mut content = state?;
        match timeout_at(deadline, content.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(content))),
            Ok(None) => None,
            Err(_) => {
                warn!("Blob read deadline exceeded");
                Some((
                    Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "blob read deadline exceeded",
                    )),
                    None,
                ))
            }
        }
    })
    .boxed()
}
