//! # LeagueSync Codec
//!
//! Value model and encodings for LeagueSync.
//!
//! This crate provides:
//! - [`Value`] / [`Document`], the pass-through shape of ingested entities
//! - Deterministic (canonical) CBOR encoding, the input to content hashing
//! - A JSON bridge for producer payloads and CLI output
//! - [`BlobFormat`] strategies for persisting materialized views
//!
//! ## Canonical CBOR Rules
//!
//! - Maps have text keys sorted length-first, then bytewise
//! - Integers use shortest encoding
//! - Floats are always 64-bit; NaN is rejected
//! - No indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use leaguesync_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let value = Value::map([("teamId", Value::Integer(42))]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod format;
mod json;
mod value;

pub use decoder::{document_from_cbor, from_cbor, CanonicalDecoder};
pub use encoder::{document_to_cbor, to_canonical_cbor, CanonicalEncoder, TIMESTAMP_TAG};
pub use error::{CodecError, CodecResult};
pub use format::{BlobFormat, CborFormat, JsonFormat};
pub use json::{document_from_json_map, document_to_json_map, documents_from_json_str};
pub use value::{Document, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scalar_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "[a-zA-Z ]{0,12}".prop_map(Value::Text),
            any::<i64>().prop_map(Value::Timestamp),
        ]
    }

    fn document_strategy() -> impl Strategy<Value = Document> {
        prop::collection::btree_map("[a-z]{1,8}", scalar_strategy(), 0..8)
    }

    proptest! {
        #[test]
        fn canonical_encoding_is_stable(doc in document_strategy()) {
            let first = document_to_cbor(&doc).unwrap();
            let second = document_to_cbor(&doc.clone()).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(document_from_cbor(&first).unwrap(), doc);
        }
    }
}
