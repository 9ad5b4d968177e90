//! Blob storage for MyCloud.
//!
//! Blobs are addressed by a [`BlobPath`] relative to the storage root:
//!
//! ```text
//! {storage_path}/
//! ├── user_alice/
//! │   ├── 0b8f6f1e-5a34-4bd1-9d0c-0c1f6f2a9e11.pdf
//! │   └── 93c2d1b4-77e0-4c55-8f0a-1d2e3f4a5b6c.txt
//! └── user_bob/
//!     └── ...
//! ```
//!
//! File names are always generated. The name a user uploads under only
//! contributes its extension.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{CloudError, Result};

/// Maximum length of a preserved file extension.
pub const MAX_EXTENSION_LENGTH: usize = 16;

/// Stream of blob content chunks.
pub type ByteStream<'a> = BoxStream<'a, io::Result<Bytes>>;

/// Validated path of a blob, relative to the blob store root.
///
/// Only plain components are allowed: no root, no `.` or `..`, no
/// backslashes or NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath(String);

impl BlobPath {
    /// Validate a relative path.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() || path.contains('\\') || path.contains('\0') {
            return Err(CloudError::Validation(format!("invalid blob path: {path:?}")));
        }
        let mut components = 0;
        for component in Path::new(&path).components() {
            match component {
                Component::Normal(_) => components += 1,
                _ => {
                    return Err(CloudError::Validation(format!(
                        "unsafe blob path component: {path:?}"
                    )))
                }
            }
        }
        // Rejects "a//b" and trailing slashes, which components() silently skips.
        if components != path.split('/').count() {
            return Err(CloudError::Validation(format!("invalid blob path: {path:?}")));
        }
        Ok(Self(path))
    }

    /// Generate a fresh path under `storage_root` for an upload named
    /// `original_name`.
    ///
    /// The result is `<storage_root>/<uuid v4><.ext>`, where `.ext` is the
    /// original extension when it is short and ASCII alphanumeric.
    pub fn generate(storage_root: &str, original_name: &str) -> Result<Self> {
        let name = match extension(original_name) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let root = Self::new(storage_root)?;
        Self::new(format!("{}/{name}", root.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this path lies strictly below `root`.
    pub fn is_under(&self, root: &str) -> bool {
        self.0
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }
}

impl std::fmt::Display for BlobPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract a safe extension from a user-supplied file name.
fn extension(original_name: &str) -> Option<&str> {
    let file_name = original_name.rsplit(['/', '\\']).next()?;
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LENGTH
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}

/// Durable byte storage addressed by [`BlobPath`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a new blob and return its size in bytes.
    ///
    /// Never overwrites: an existing blob at `path` is a `Conflict`. On any
    /// failure, including an error item from `data`, nothing is left at `path`.
    async fn write(&self, path: &BlobPath, data: ByteStream<'_>) -> Result<u64>;

    /// Open a blob for streaming. A missing blob is `BlobMissing`.
    async fn read(&self, path: &BlobPath) -> Result<ByteStream<'static>>;

    async fn exists(&self, path: &BlobPath) -> Result<bool>;

    /// Delete a blob. Returns false if it did not exist.
    async fn delete(&self, path: &BlobPath) -> Result<bool>;
}

/// Blob store backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &BlobPath) -> PathBuf {
        self.root.join(path.as_str())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, path: &BlobPath, mut data: ByteStream<'_>) -> Result<u64> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CloudError::StorageWrite(e.to_string()))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    CloudError::Conflict(format!("blob already exists: {path}"))
                }
                _ => CloudError::StorageWrite(e.to_string()),
            })?;

        let copied = async {
            let mut written = 0u64;
            while let Some(chunk) = data.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.sync_all().await?;
            Ok::<_, io::Error>(written)
        }
        .await;

        match copied {
            Ok(written) => {
                debug!(path = %path, bytes = written, "Blob written");
                Ok(written)
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = fs::remove_file(&full).await {
                    warn!(path = %path, error = %rm, "Failed to remove partial blob");
                }
                Err(CloudError::StorageWrite(e.to_string()))
            }
        }
    }

    async fn read(&self, path: &BlobPath) -> Result<ByteStream<'static>> {
        let file = fs::File::open(self.full_path(path))
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => CloudError::BlobMissing(path.to_string()),
                _ => CloudError::Storage(e.to_string()),
            })?;
        Ok(ReaderStream::new(file).boxed())
    }

    async fn exists(&self, path: &BlobPath) -> Result<bool> {
        fs::try_exists(self.full_path(path))
            .await
            .map_err(|e| CloudError::Storage(e.to_string()))
    }

    async fn delete(&self, path: &BlobPath) -> Result<bool> {
        match fs::remove_file(self.full_path(path)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CloudError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().join("media")).unwrap();
        (dir, store)
    }

    fn chunks(parts: &[&'static [u8]]) -> ByteStream<'static> {
        let items: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        stream::iter(items).boxed()
    }

    async fn read_all(store: &FsBlobStore, path: &BlobPath) -> Vec<u8> {
        let parts: Vec<Bytes> = store.read(path).await.unwrap().try_collect().await.unwrap();
        parts.concat()
    }

    #[test]
    fn test_blob_path_accepts_relative() {
        assert!(BlobPath::new("user_alice/abc.txt").is_ok());
        assert!(BlobPath::new("abc").is_ok());
    }

    #[test]
    fn test_blob_path_rejects_traversal() {
        for bad in [
            "",
            "../etc/passwd",
            "user_alice/../../x",
            "/etc/passwd",
            "./a",
            "a//b",
            "a/",
            "a\\b",
            "a\0b",
        ] {
            assert!(BlobPath::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_generate_keeps_extension() {
        let path = BlobPath::generate("user_alice", "report.pdf").unwrap();
        assert!(path.as_str().starts_with("user_alice/"));
        assert!(path.as_str().ends_with(".pdf"));
        assert!(path.is_under("user_alice"));
    }

    #[test]
    fn test_generate_ignores_user_name() {
        let path = BlobPath::generate("user_alice", "../../evil name.sh").unwrap();
        assert!(path.is_under("user_alice"));
        assert!(!path.as_str().contains("evil"));
        assert!(path.as_str().ends_with(".sh"));
    }

    #[test]
    fn test_generate_drops_unsafe_extension() {
        let path = BlobPath::generate("user_alice", "notes.t x t").unwrap();
        assert!(!path.as_str().contains('.'));
        let path = BlobPath::generate("user_alice", "README").unwrap();
        assert!(!path.as_str().contains('.'));
    }

    #[test]
    fn test_generate_is_unique() {
        let a = BlobPath::generate("user_alice", "a.txt").unwrap();
        let b = BlobPath::generate("user_alice", "a.txt").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_rejects_bad_root() {
        assert!(BlobPath::generate("../outside", "a.txt").is_err());
    }

    #[test]
    fn test_is_under() {
        let path = BlobPath::new("user_al/x.txt").unwrap();
        assert!(path.is_under("user_al"));
        assert!(!path.is_under("user_a"));
        assert!(!path.is_under("user_alice"));
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_dir, store) = setup();
        let path = BlobPath::new("user_alice/a.txt").unwrap();

        let size = store
            .write(&path, chunks(&[b"hello ", b"world"]))
            .await
            .unwrap();
        assert_eq!(size, 11);
        assert!(store.exists(&path).await.unwrap());
        assert_eq!(read_all(&store, &path).await, b"hello world");
    }

    #[tokio::test]
    async fn test_write_never_overwrites() {
        let (_dir, store) = setup();
        let path = BlobPath::new("user_alice/a.txt").unwrap();
        store.write(&path, chunks(&[b"first"])).await.unwrap();

        let err = store.write(&path, chunks(&[b"second"])).await.unwrap_err();
        assert!(matches!(err, CloudError::Conflict(_)));
        assert_eq!(read_all(&store, &path).await, b"first");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing() {
        let (_dir, store) = setup();
        let path = BlobPath::new("user_alice/broken.bin").unwrap();
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire")),
        ];

        let err = store
            .write(&path, stream::iter(items).boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::StorageWrite(_)));
        assert!(!store.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_blob_missing() {
        let (_dir, store) = setup();
        let path = BlobPath::new("user_alice/none.txt").unwrap();
        let err = store.read(&path).await.err().unwrap();
        assert!(matches!(err, CloudError::BlobMissing(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (_dir, store) = setup();
        let path = BlobPath::new("user_alice/a.txt").unwrap();

        assert!(!store.delete(&path).await.unwrap());
        store.write(&path, chunks(&[b"x"])).await.unwrap();
        assert!(store.delete(&path).await.unwrap());
        assert!(!store.exists(&path).await.unwrap());
        assert!(!store.delete(&path).await.unwrap());
    }
}
