//! Pluggable serialization formats for whole-object blob storage.
//!
//! Materialized views are persisted as opaque blobs. The format is chosen
//! per view: structured text by default, binary for bulky payloads.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A serialization strategy for blobs.
pub trait BlobFormat: Send + Sync + 'static {
    /// Short name used in logs and blob file extensions.
    fn name(&self) -> &'static str;

    /// Serializes a value to bytes.
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Deserializes a value from bytes.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;
}

/// Structured-text format backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl BlobFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}

/// Binary format backed by `ciborium`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborFormat;

impl BlobFormat for CborFormat {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::into_writer(value, &mut out)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(out)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}
