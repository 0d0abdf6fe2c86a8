//! In-memory document store.

use crate::document::{DocumentStore, FieldUpdate, RangeQuery, SetMode, WriteBatch, WriteOp};
use crate::error::{StorageError, StorageResult};
use crate::path::DocPath;
use leaguesync_codec::Document;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A document store held entirely in memory.
///
/// This store is suitable for:
/// - Unit and integration tests
/// - Ephemeral deployments that rebuild from the producer on restart
/// - The working set of [`crate::FileDocumentStore`]
///
/// It also records which paths each committed batch wrote and can be
/// told to fail upcoming commits, so callers can observe write
/// amplification and exercise retry paths.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<BTreeMap<DocPath, Document>>,
    write_log: Mutex<Vec<DocPath>>,
    commit_lock: Mutex<()>,
    commits: AtomicU64,
    failing_commits: AtomicU32,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with documents.
    #[must_use]
    pub fn with_documents(docs: BTreeMap<DocPath, Document>) -> Self {
        Self {
            docs: RwLock::new(docs),
            ..Self::default()
        }
    }

    /// Makes the next `count` commits fail with a retryable error.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of successfully committed batches (including single writes).
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Drains the list of paths written since the last call.
    pub fn take_write_log(&self) -> Vec<DocPath> {
        std::mem::take(&mut *self.write_log.lock())
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Returns true if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Returns a copy of every stored document.
    pub fn snapshot(&self) -> BTreeMap<DocPath, Document> {
        self.docs.read().clone()
    }

    /// Reads a document without going through the async interface.
    pub fn get_now(&self, path: &DocPath) -> Option<Document> {
        self.docs.read().get(path).cloned()
    }

    /// Applies a batch synchronously.
    ///
    /// All operations are staged against an overlay first; the shared map
    /// is only touched once every operation has been validated.
    pub fn apply_batch(&self, batch: &WriteBatch) -> StorageResult<()> {
        let _guard = self.commit_lock.lock();
        let staged = self.stage(batch)?;
        self.publish(staged);
        Ok(())
    }

    /// Validates a batch and resolves it into per-path outcomes without
    /// touching the stored documents.
    pub(crate) fn stage(&self, batch: &WriteBatch) -> StorageResult<StagedBatch> {
        let remaining = self.failing_commits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_commits.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected commit failure".into()));
        }

        let docs = self.docs.read();
        let mut staged: BTreeMap<DocPath, Option<Document>> = BTreeMap::new();

        for op in batch.ops() {
            let path = op.path();
            if !path.is_document() {
                return Err(StorageError::invalid_path(
                    path.as_string(),
                    "expected a document path",
                ));
            }
            let current = match staged.get(path) {
                Some(doc) => doc.clone(),
                None => docs.get(path).cloned(),
            };
            let next = match op {
                WriteOp::Set { document, mode, .. } => match (*mode, current) {
                    (SetMode::Merge, Some(mut existing)) => {
                        existing.extend(document.clone());
                        Some(existing)
                    }
                    _ => Some(document.clone()),
                },
                WriteOp::Update { fields, .. } => {
                    let mut existing =
                        current.ok_or_else(|| StorageError::not_found(path.as_string()))?;
                    apply_field_updates(&mut existing, fields);
                    Some(existing)
                }
                WriteOp::Delete { .. } => None,
            };
            staged.insert(path.clone(), next);
        }
        Ok(StagedBatch { outcomes: staged })
    }

    /// Makes a staged batch visible and counts it as a commit.
    pub(crate) fn publish(&self, staged: StagedBatch) {
        let mut docs = self.docs.write();
        let mut log = self.write_log.lock();
        for (path, doc) in staged.outcomes {
            log.push(path.clone());
            match doc {
                Some(doc) => {
                    docs.insert(path, doc);
                }
                None => {
                    docs.remove(&path);
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    /// Runs a query synchronously.
    pub fn query_now(&self, collection: &DocPath, query: &RangeQuery) -> Vec<(DocPath, Document)> {
        let docs = self.docs.read();
        let depth = collection.depth() + 1;
        let candidates = docs
            .range(collection.clone()..)
            .take_while(|(path, _)| path.segments().starts_with(collection.segments()))
            .filter(|(path, _)| path.depth() == depth)
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect();
        query.apply(candidates)
    }
}

/// The resolved outcome of a validated batch: the new document for each
/// touched path, or `None` where it is deleted.
#[derive(Debug)]
pub(crate) struct StagedBatch {
    outcomes: BTreeMap<DocPath, Option<Document>>,
}

impl StagedBatch {
    /// Applies the outcomes to a copy of the stored documents.
    pub(crate) fn apply_to(&self, docs: &mut BTreeMap<DocPath, Document>) {
        for (path, doc) in &self.outcomes {
            match doc {
                Some(doc) => {
                    docs.insert(path.clone(), doc.clone());
                }
                None => {
                    docs.remove(path);
                }
            }
        }
    }
}

/// Applies field updates in order.
pub(crate) fn apply_field_updates(doc: &mut Document, fields: &[(String, FieldUpdate)]) {
    for (field, update) in fields {
        match update {
            FieldUpdate::Set(value) => {
                doc.insert(field.clone(), value.clone());
            }
            FieldUpdate::Delete => {
                doc.remove(field);
            }
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> StorageResult<Option<Document>> {
        Ok(self.get_now(path))
    }

    async fn set(&self, path: &DocPath, document: Document, mode: SetMode) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.set(path.clone(), document, mode);
        self.apply_batch(&batch)
    }

    async fn update(&self, path: &DocPath, fields: Vec<(String, FieldUpdate)>) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.update(path.clone(), fields);
        self.apply_batch(&batch)
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        self.apply_batch(&batch)
    }

    async fn query(
        &self,
        collection: &DocPath,
        query: &RangeQuery,
    ) -> StorageResult<Vec<(DocPath, Document)>> {
        Ok(self.query_now(collection, query))
    }
}
