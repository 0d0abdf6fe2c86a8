//! Document store interface.

use crate::error::StorageResult;
use crate::path::DocPath;
use leaguesync_codec::{Document, Value};
use std::cmp::Ordering;
use std::future::Future;

/// How [`DocumentStore::set`] treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Replace the whole document.
    #[default]
    Overwrite,
    /// Merge top-level fields into the existing document.
    Merge,
}

/// A single field change applied by [`DocumentStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Set the field to a value.
    Set(Value),
    /// Remove the field.
    Delete,
}

/// One operation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace (or merge into) a document.
    Set {
        /// Target document.
        path: DocPath,
        /// New contents.
        document: Document,
        /// Overwrite or merge.
        mode: SetMode,
    },
    /// Change fields of an existing document.
    Update {
        /// Target document.
        path: DocPath,
        /// Field changes, applied in order.
        fields: Vec<(String, FieldUpdate)>,
    },
    /// Remove a document.
    Delete {
        /// Target document.
        path: DocPath,
    },
}

impl WriteOp {
    /// The document this operation touches.
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Update { path, .. } | WriteOp::Delete { path } => {
                path
            }
        }
    }
}

/// An ordered set of writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set operation.
    pub fn set(&mut self, path: DocPath, document: Document, mode: SetMode) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path,
            document,
            mode,
        });
        self
    }

    /// Adds an update operation.
    pub fn update(&mut self, path: DocPath, fields: Vec<(String, FieldUpdate)>) -> &mut Self {
        self.ops.push(WriteOp::Update { path, fields });
        self
    }

    /// Adds a delete operation.
    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    /// The operations in commit order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Sort direction for range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// An ordered, filtered query over the documents of one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeQuery {
    /// Strict lower bound: `(field, epoch millis)`; only documents whose
    /// timestamp field is later are returned.
    pub after: Option<(String, i64)>,
    /// Equality filters on top-level fields.
    pub filters: Vec<(String, Value)>,
    /// Sort field and direction. Documents lacking the field are excluded.
    pub order_by: Option<(String, Direction)>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl RangeQuery {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps documents whose timestamp `field` is strictly after `millis`.
    #[must_use]
    pub fn after(mut self, field: impl Into<String>, millis: i64) -> Self {
        self.after = Some((field.into(), millis));
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if a document passes the bound and filters.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some((field, bound)) = &self.after {
            match doc.get(field).and_then(Value::as_timestamp_millis) {
                Some(ts) if ts > *bound => {}
                _ => return false,
            }
        }
        if let Some((field, _)) = &self.order_by {
            if !doc.contains_key(field) {
                return false;
            }
        }
        self.filters
            .iter()
            .all(|(field, expected)| doc.get(field).is_some_and(|v| values_equal(v, expected)))
    }

    /// Filters, sorts and truncates candidate documents.
    pub fn apply(&self, mut docs: Vec<(DocPath, Document)>) -> Vec<(DocPath, Document)> {
        docs.retain(|(_, doc)| self.matches(doc));
        if let Some((field, direction)) = &self.order_by {
            docs.sort_by(|(pa, a), (pb, b)| {
                let ord = compare_values(&a[field], &b[field]).then_with(|| pa.cmp(pb));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Equality used by query filters: integers and floats compare numerically.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            compare_values(a, b) == Ordering::Equal
        }
        _ => a == b,
    }
}

/// Total order used by range queries.
///
/// Numbers compare numerically, text and timestamps naturally; values of
/// different kinds order by kind.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) | (Value::Timestamp(x), Value::Timestamp(y)) => {
            x.cmp(y)
        }
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let x = a.as_float().unwrap_or_default();
            let y = b.as_float().unwrap_or_default();
            x.total_cmp(&y)
        }
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::Timestamp(_) => 3,
        Value::Text(_) => 4,
        Value::Bytes(_) => 5,
        Value::Array(_) => 6,
        Value::Map(_) => 7,
    }
}

/// A key-value document store.
///
/// This is the durable collaborator behind the event store. Writes made
/// through [`commit`](Self::commit) are all-or-nothing; implementations
/// provide read-your-writes once a commit returns.
pub trait DocumentStore: Send + Sync {
    /// Reads a document.
    fn get(&self, path: &DocPath) -> impl Future<Output = StorageResult<Option<Document>>> + Send;

    /// Writes a document.
    fn set(
        &self,
        path: &DocPath,
        document: Document,
        mode: SetMode,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Changes fields of an existing document.
    ///
    /// Fails with [`crate::StorageError::NotFound`] if the document is missing.
    fn update(
        &self,
        path: &DocPath,
        fields: Vec<(String, FieldUpdate)>,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Applies every operation in the batch, or none of them.
    fn commit(&self, batch: WriteBatch) -> impl Future<Output = StorageResult<()>> + Send;

    /// Returns the documents directly inside `collection` that match `query`.
    fn query(
        &self,
        collection: &DocPath,
        query: &RangeQuery,
    ) -> impl Future<Output = StorageResult<Vec<(DocPath, Document)>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn path(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[test]
    fn batch_keeps_order() {
        let mut batch = WriteBatch::new();
        batch
            .set(path("c/1"), Document::new(), SetMode::Overwrite)
            .delete(path("c/2"));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[1].path(), &path("c/2"));
    }

    #[test]
    fn numeric_filters_ignore_representation() {
        assert!(values_equal(&Value::Integer(5), &Value::Float(5.0)));
        assert!(!values_equal(&Value::Integer(5), &Value::from("5")));
    }

    #[test]
    fn query_filters_orders_and_limits() {
        let docs = vec![
            (path("s/a"), doc(&[("ts", Value::Timestamp(10)), ("week", Value::Integer(5))])),
            (path("s/b"), doc(&[("ts", Value::Timestamp(30)), ("week", Value::Integer(5))])),
            (path("s/c"), doc(&[("ts", Value::Timestamp(20)), ("week", Value::Integer(6))])),
            (path("s/d"), doc(&[("ts", Value::Timestamp(40)), ("week", Value::Integer(5))])),
        ];
        let query = RangeQuery::new()
            .after("ts", 15)
            .filter("week", Value::Integer(5))
            .order_by("ts", Direction::Descending)
            .limit(1);

        let result = query.apply(docs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0.id(), "d");
    }

    #[test]
    fn after_bound_requires_timestamp() {
        let query = RangeQuery::new().after("ts", 0);
        assert!(!query.matches(&doc(&[("ts", Value::Integer(5))])));
        assert!(query.matches(&doc(&[("ts", Value::Timestamp(5))])));
    }
}
