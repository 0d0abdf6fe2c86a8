//! Views persisted to blob storage.

use super::cached::{CachedView, ViewBacking};
use super::{UpdateFn, View};
use crate::config::CacheConfig;
use crate::error::CoreResult;
use leaguesync_codec::BlobFormat;
use leaguesync_storage::BlobStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Default blob path prefix for persisted views.
pub const VIEW_PREFIX: &str = "views";

/// Stores serialized views at `{prefix}/{view}/{key}.{format}`.
#[derive(Debug)]
pub struct DurableBacking<B, F> {
    blobs: Arc<B>,
    format: F,
    prefix: String,
}

impl<B: BlobStore, F: BlobFormat> DurableBacking<B, F> {
    /// Creates a backing tier on `blobs` using `format`.
    pub fn new(blobs: Arc<B>, format: F) -> Self {
        Self {
            blobs,
            format,
            prefix: VIEW_PREFIX.to_string(),
        }
    }

    /// Sets the path prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The blob path for one view key.
    pub fn path(&self, view: &str, key: &str) -> String {
        format!("{}/{}/{}.{}", self.prefix, view, key, self.format.name())
    }

    /// The underlying blob store.
    pub fn blobs(&self) -> &Arc<B> {
        &self.blobs
    }
}

impl<T, B, F> ViewBacking<T> for DurableBacking<B, F>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    B: BlobStore + 'static,
    F: BlobFormat,
{
    async fn load(&self, view: &str, key: &str) -> CoreResult<Option<T>> {
        let Some(bytes) = self.blobs.read(&self.path(view, key)).await? else {
            return Ok(None);
        };
        Ok(Some(self.format.decode(&bytes)?))
    }

    async fn store(&self, view: &str, key: &str, value: &T) -> CoreResult<()> {
        let bytes = self.format.encode(value)?;
        self.blobs.write(&self.path(view, key), bytes).await?;
        Ok(())
    }
}

/// A cached view persisted to blob storage.
///
/// On a cache miss the stored copy is read before falling back to a full
/// recompute. After every recompute or incremental update the result is
/// written back. Storage failures are logged and otherwise ignored; a
/// failing recompute still propagates.
pub type DurableView<V, B, F> = CachedView<V, DurableBacking<B, F>>;

impl<V, B, F> CachedView<V, DurableBacking<B, F>>
where
    V: View,
    V::Output: Serialize + DeserializeOwned,
    B: BlobStore + 'static,
    F: BlobFormat,
{
    /// Wraps `inner` in an in-memory cache over durable blob storage.
    pub fn durable(
        inner: V,
        blobs: Arc<B>,
        format: F,
        update: UpdateFn<V::Output>,
        config: &CacheConfig,
    ) -> Self {
        Self::with_backing(inner, DurableBacking::new(blobs, format), update, config)
    }
}
