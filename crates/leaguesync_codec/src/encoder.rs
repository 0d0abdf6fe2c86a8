//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{Document, Value};

/// CBOR tag wrapping a [`Value::Timestamp`] (epoch milliseconds).
///
/// Lives in the first-come-first-served range; standard tag 1 carries
/// seconds, which would lose precision.
pub const TIMESTAMP_TAG: u64 = 1_001_000;

/// Encode a value to canonical CBOR bytes.
///
/// The output is deterministic:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - Floats are always written as 64-bit
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns an error if the value contains a NaN float.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Encode a document (a top-level map) to canonical CBOR bytes.
///
/// # Errors
///
/// Returns an error if the document contains a NaN float.
pub fn document_to_cbor(doc: &Document) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode_map(doc)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => self.encode_float(*f)?,
            Value::Bytes(b) => {
                self.encode_unsigned(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => self.encode_text(s),
            Value::Timestamp(ms) => {
                self.encode_unsigned(6, TIMESTAMP_TAG);
                self.encode_integer(*ms);
            }
            Value::Array(arr) => {
                self.encode_unsigned(4, arr.len() as u64);
                for item in arr {
                    self.encode(item)?;
                }
            }
            Value::Map(doc) => self.encode_map(doc)?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1)
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    fn encode_float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        // -0.0 and 0.0 compare equal, so they must hash equal too.
        let f = if f == 0.0 { 0.0 } else { f };
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_map(&mut self, doc: &Document) -> CodecResult<()> {
        // BTreeMap order is lexicographic; canonical order is length-first.
        let mut keys: Vec<&String> = doc.keys().collect();
        keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        self.encode_unsigned(5, doc.len() as u64);
        for key in keys {
            self.encode_text(key);
            self.encode(&doc[key])?;
        }
        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn encode_integers_shortest_form() {
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(24)).unwrap(),
            vec![0x18, 24]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)).unwrap(),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(-100)).unwrap(),
            vec![0x38, 99]
        );
    }

    #[test]
    fn encode_float_as_double() {
        let bytes = to_canonical_cbor(&Value::Float(1.5)).unwrap();
        assert_eq!(bytes[0], 0xfb);
        assert_eq!(&bytes[1..], &1.5f64.to_be_bytes());
    }

    #[test]
    fn negative_zero_matches_zero() {
        assert_eq!(
            to_canonical_cbor(&Value::Float(-0.0)).unwrap(),
            to_canonical_cbor(&Value::Float(0.0)).unwrap()
        );
    }

    #[test]
    fn nan_rejected() {
        assert_eq!(
            to_canonical_cbor(&Value::Float(f64::NAN)),
            Err(CodecError::NaNForbidden)
        );
    }

    #[test]
    fn encode_map_length_first() {
        let map = Value::map([("bb", Value::Integer(2)), ("a", Value::Integer(1))]);
        let bytes = to_canonical_cbor(&map).unwrap();

        // map(2), "a", 1, "bb", 2
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }

    #[test]
    fn length_first_differs_from_btree_order() {
        // BTreeMap yields "ab" before "b"; canonical order puts "b" first.
        let map = Value::map([("ab", Value::Integer(1)), ("b", Value::Integer(2))]);
        let bytes = to_canonical_cbor(&map).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'b', 0x02, 0x62, b'a', b'b', 0x01]);
    }

    #[test]
    fn timestamp_is_tagged() {
        let bytes = to_canonical_cbor(&Value::Timestamp(5)).unwrap();
        // major type 6, 4-byte argument
        assert_eq!(bytes[0], 0xda);
        assert_eq!(*bytes.last().unwrap(), 0x05);
    }
}
