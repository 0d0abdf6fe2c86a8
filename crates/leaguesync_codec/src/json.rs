//! Bridge between [`Value`] and `serde_json`.
//!
//! Snapshots arrive from the producer as JSON; the CLI prints JSON.

use crate::error::{CodecError, CodecResult};
use crate::value::{Document, Value};
use serde_json::{Map, Number};

impl Value {
    /// Converts a JSON value.
    ///
    /// Integral numbers that fit in `i64` become [`Value::Integer`]; every
    /// other number becomes [`Value::Float`].
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(document_from_json_map(map)),
        }
    }

    /// Converts to JSON.
    ///
    /// Timestamps become epoch milliseconds and byte strings become
    /// lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns an error for non-finite floats, which JSON cannot carry.
    pub fn to_json(&self) -> CodecResult<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) | Value::Timestamp(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| CodecError::encoding_failed("non-finite float"))?,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(
                b.iter().map(|byte| format!("{byte:02x}")).collect(),
            ),
            Value::Array(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<CodecResult<_>>()?,
            ),
            Value::Map(doc) => serde_json::Value::Object(document_to_json_map(doc)?),
        })
    }
}

/// Converts a JSON object into a document.
pub fn document_from_json_map(map: Map<String, serde_json::Value>) -> Document {
    map.into_iter()
        .map(|(k, v)| (k, Value::from_json(v)))
        .collect()
}

/// Converts a document into a JSON object.
///
/// # Errors
///
/// Returns an error for non-finite floats.
pub fn document_to_json_map(doc: &Document) -> CodecResult<Map<String, serde_json::Value>> {
    doc.iter()
        .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
        .collect()
}

/// Parses a JSON array of objects into documents.
///
/// # Errors
///
/// Returns an error if the text is not JSON or not an array of objects.
pub fn documents_from_json_str(text: &str) -> CodecResult<Vec<Document>> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    let serde_json::Value::Array(items) = parsed else {
        return Err(CodecError::invalid_structure("expected a JSON array"));
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(map) => Ok(document_from_json_map(map)),
            _ => Err(CodecError::invalid_structure(
                "expected every array element to be an object",
            )),
        })
        .collect()
}
