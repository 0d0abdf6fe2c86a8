//! # LeagueSync Storage
//!
//! Storage collaborators for LeagueSync.
//!
//! The synchronization core never talks to a database directly. It uses
//! two narrow interfaces:
//!
//! - [`DocumentStore`] - get / set / merge / update (with an explicit field
//!   deletion marker), atomic [`WriteBatch`] commit, and ordered, filtered
//!   [`RangeQuery`] reads over one collection
//! - [`BlobStore`] - whole-object read/write by path, used to persist
//!   materialized views
//!
//! ## Available Implementations
//!
//! - [`InMemoryDocumentStore`] / [`InMemoryBlobStore`] - for tests and
//!   ephemeral deployments
//! - [`FileDocumentStore`] / [`FileBlobStore`] - persistent, file based
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn demo() -> leaguesync_storage::StorageResult<()> {
//! use leaguesync_codec::{Document, Value};
//! use leaguesync_storage::{DocPath, DocumentStore, InMemoryDocumentStore, SetMode};
//!
//! let store = InMemoryDocumentStore::new();
//! let path = DocPath::parse("league_data/17/TEAMS/4")?;
//! let mut team = Document::new();
//! team.insert("ovrRating".into(), Value::Integer(80));
//! store.set(&path, team, SetMode::Overwrite).await?;
//! assert!(store.get(&path).await?.is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod document;
mod error;
mod file;
mod memory;
mod path;

pub use blob::{BlobStore, FileBlobStore, InMemoryBlobStore};
pub use document::{
    compare_values, values_equal, Direction, DocumentStore, FieldUpdate, RangeQuery, SetMode,
    WriteBatch, WriteOp,
};
pub use error::{StorageError, StorageResult};
pub use file::FileDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use path::DocPath;
