//! Canonical byte encoding of structured values.
//!
//! The canonical form is compact JSON: mapping keys sorted by code point, no
//! insignificant whitespace, single-byte `,` and `:`, non-ASCII text written as
//! raw UTF-8 and only `"`, `\` and control characters escaped. `serde_json`'s
//! compact writer produces exactly this when fed a [`Value`], whose maps iterate
//! in key order.

use serde::Serialize;

use crate::error::EncodingError;
use crate::value::Value;

/// Canonical bytes of a value.
pub fn canon(value: &Value) -> Result<Vec<u8>, EncodingError> {
    canon_serialize(value)
}

/// Canonical bytes of any serialisable type whose maps are ordered.
///
/// Callers must only pass types that serialise mappings in key order
/// (`BTreeMap`, [`Value`], or structs with fields declared alphabetically).
pub(crate) fn canon_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode bytes produced by [`canon`] (or any JSON of a supported shape).
pub fn decode(bytes: &[u8]) -> Result<Value, EncodingError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode, rejecting input that is not already in canonical form.
pub fn decode_canonical(bytes: &[u8]) -> Result<Value, EncodingError> {
    let value = decode(bytes)?;
    let again = canon(&value)?;
    if let Some(offset) = first_difference(bytes, &again) {
        return Err(EncodingError::NonCanonical { offset });
    }
    Ok(value)
}

/// Re-encode arbitrary JSON bytes into canonical form.
pub fn recanon(bytes: &[u8]) -> Result<Vec<u8>, EncodingError> {
    canon(&decode(bytes)?)
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(pos) => Some(pos),
        None if a.len() != b.len() => Some(a.len().min(b.len())),
        None => None,
    }
}
