//! File management module for MyCloud.
//!
//! - Blob storage under per-user storage roots
//! - File registry with public link tokens
//! - Lifecycle orchestration with owner-or-admin access control

mod link;
mod metadata;
mod service;
mod storage;

pub use link::{link_path, LinkToken};
pub use metadata::{FileRecord, FileRepository, FileUpdate, NewFile, MAX_LINK_ATTEMPTS};
pub use service::{Download, FileScope, FileService, StagedUpload};
pub use storage::{BlobPath, BlobStore, ByteStream, FsBlobStore, MAX_EXTENSION_LENGTH};

use crate::{CloudError, Result};

/// Maximum length for a display name (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length for a file comment (in characters).
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Default maximum upload size (100MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Normalize a user-supplied file name into a display name.
///
/// Any directory part a client sends is dropped.
pub fn display_name(raw: &str) -> Result<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(CloudError::Validation("file name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_FILENAME_LENGTH {
        return Err(CloudError::Validation(format!(
            "file name must be at most {MAX_FILENAME_LENGTH} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(CloudError::Validation(
            "file name contains invalid characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Check a comment against [`MAX_COMMENT_LENGTH`].
pub fn validate_comment(comment: &str) -> Result<()> {
    if comment.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CloudError::Validation(format!(
            "comment must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }
    Ok(())
}
