//! Whole-object blob storage.

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Durable storage for opaque blobs addressed by a relative path.
///
/// Used to persist serialized materialized views; objects are always read
/// and written whole.
pub trait BlobStore: Send + Sync {
    /// Reads a blob, returning `None` if nothing is stored at `path`.
    fn read(&self, path: &str) -> impl Future<Output = StorageResult<Option<Vec<u8>>>> + Send;

    /// Writes (or replaces) a blob.
    fn write(&self, path: &str, bytes: Vec<u8>) -> impl Future<Output = StorageResult<()>> + Send;
}

/// A blob store held in memory.
///
/// Can be switched into a failing mode to exercise fallback paths.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every read and write fails with a retryable error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns true if a blob is stored at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.blobs.read().contains_key(path)
    }

    /// Stores a blob synchronously.
    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().insert(path.into(), bytes);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("blob store offline".into()));
        }
        Ok(())
    }
}

impl BlobStore for InMemoryBlobStore {
    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.blobs.read().get(path).cloned())
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.check_available()?;
        self.blobs.write().insert(path.to_string(), bytes);
        Ok(())
    }
}

/// A blob store rooted at a directory; each blob is one file.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a blob path below the root, rejecting escapes.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty() {
            return Err(StorageError::invalid_path(path, "empty path"));
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::invalid_path(path, "path must stay below the root"));
            }
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FileBlobStore {
    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = full.with_extension("partial");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &full).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn memory_read_write() {
        let store = InMemoryBlobStore::new();
        assert_eq!(store.read("views/a").await.unwrap(), None);
        store.write("views/a", vec![1, 2]).await.unwrap();
        assert_eq!(store.read("views/a").await.unwrap(), Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn memory_failing_mode() {
        let store = InMemoryBlobStore::new();
        store.insert("views/a", vec![1]);
        store.set_failing(true);
        assert!(store.read("views/a").await.unwrap_err().is_retryable());
        assert!(store.write("views/b", vec![]).await.is_err());
        store.set_failing(false);
        assert!(!store.contains("views/b"));
    }

    #[tokio::test]
    async fn file_store_creates_directories() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        store
            .write("views/teams/17.json", b"{}".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.read("views/teams/17.json").await.unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(store.read("views/teams/18.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_escapes() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        assert!(matches!(
            store.read("../outside").await,
            Err(StorageError::InvalidPath { .. })
        ));
        assert!(store.write("/etc/passwd", vec![]).await.is_err());
    }
}
