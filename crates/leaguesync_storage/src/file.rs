//! File-backed document store.

use crate::document::{DocumentStore, FieldUpdate, RangeQuery, SetMode, WriteBatch};
use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryDocumentStore;
use crate::path::DocPath;
use leaguesync_codec::{document_from_cbor, document_to_cbor, Document, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// A document store persisted to a single file.
///
/// The working set lives in an [`InMemoryDocumentStore`]. After every
/// successful mutation the whole set is written as canonical CBOR to a
/// temporary sibling file which then replaces the target, so a crash
/// leaves either the old or the new state on disk.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> leaguesync_storage::StorageResult<()> {
/// use leaguesync_storage::FileDocumentStore;
///
/// let store = FileDocumentStore::open("data/documents.cbor").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    inner: InMemoryDocumentStore,
    persist_lock: Mutex<()>,
}

impl FileDocumentStore {
    /// Opens the store, loading existing contents if the file exists.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is corrupted.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let docs = match tokio::fs::read(&path).await {
            Ok(bytes) => decode_documents(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), documents = docs.len(), "opened document store");

        Ok(Self {
            path,
            inner: InMemoryDocumentStore::with_documents(docs),
            persist_lock: Mutex::new(()),
        })
    }

    /// Returns the path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Persists the batch, then makes it visible.
    ///
    /// Readers never observe a batch that did not reach disk.
    async fn mutate(&self, batch: WriteBatch) -> StorageResult<()> {
        let _guard = self.persist_lock.lock().await;
        let staged = self.inner.stage(&batch)?;
        let mut next = self.inner.snapshot();
        staged.apply_to(&mut next);
        let bytes = encode_documents(&next)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        self.inner.publish(staged);
        Ok(())
    }
}

fn encode_documents(docs: &BTreeMap<DocPath, Document>) -> StorageResult<Vec<u8>> {
    let root: Document = docs
        .iter()
        .map(|(path, doc)| (path.as_string(), Value::Map(doc.clone())))
        .collect();
    Ok(document_to_cbor(&root)?)
}

fn decode_documents(bytes: &[u8]) -> StorageResult<BTreeMap<DocPath, Document>> {
    let root = document_from_cbor(bytes)?;
    root.into_iter()
        .map(|(path, value)| match value {
            Value::Map(doc) => Ok((DocPath::parse(&path)?, doc)),
            _ => Err(StorageError::Corrupted(format!(
                "entry {path} is not a document"
            ))),
        })
        .collect()
}

impl DocumentStore for FileDocumentStore {
    async fn get(&self, path: &DocPath) -> StorageResult<Option<Document>> {
        Ok(self.inner.get_now(path))
    }

    async fn set(&self, path: &DocPath, document: Document, mode: SetMode) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.set(path.clone(), document, mode);
        self.mutate(batch).await
    }

    async fn update(&self, path: &DocPath, fields: Vec<(String, FieldUpdate)>) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.update(path.clone(), fields);
        self.mutate(batch).await
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        self.mutate(batch).await
    }

    async fn query(
        &self,
        collection: &DocPath,
        query: &RangeQuery,
    ) -> StorageResult<Vec<(DocPath, Document)>> {
        Ok(self.inner.query_now(collection, query))
    }
}
