//! Hierarchical document paths.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// A slash-separated path into the document store.
///
/// Segments alternate between collection ids and document ids, so
/// `league_data/17/TEAMS/4` names document `4` in collection
/// `league_data/17/TEAMS`. Collections themselves are addressed with an
/// odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Creates a single-segment (collection) path.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is empty or contains a slash.
    pub fn collection(name: impl Into<String>) -> StorageResult<Self> {
        let name = name.into();
        validate_segment(&name)?;
        Ok(Self {
            segments: vec![name],
        })
    }

    /// Parses a slash-separated path.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is empty.
    pub fn parse(path: &str) -> StorageResult<Self> {
        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        for segment in &segments {
            validate_segment(segment).map_err(|_| StorageError::invalid_path(path, "empty segment"))?;
        }
        Ok(Self { segments })
    }

    /// Appends one segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is empty or contains a slash.
    pub fn join(&self, segment: impl Into<String>) -> StorageResult<Self> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Appends a collection and a document id.
    ///
    /// # Errors
    ///
    /// Returns an error if either segment is invalid.
    pub fn child(&self, collection: impl Into<String>, id: impl Into<String>) -> StorageResult<Self> {
        self.join(collection)?.join(id)
    }

    /// Returns true if this path names a document rather than a collection.
    pub fn is_document(&self) -> bool {
        self.segments.len() % 2 == 0
    }

    /// The last segment.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The path one level up, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Renders the path as a string.
    pub fn as_string(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty() {
        return Err(StorageError::invalid_path(segment, "empty segment"));
    }
    if segment.contains('/') {
        return Err(StorageError::invalid_path(segment, "segment contains '/'"));
    }
    Ok(())
}
