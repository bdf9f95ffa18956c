//! Deterministic serialisation of events to bytes suitable for hashing.
//!
//! `serde_json::Value`'s default `Map` implementation is `BTreeMap`-backed
//! (the `preserve_order` feature is never enabled in this workspace), so
//! `serde_json::to_vec` already sorts object keys lexicographically at every
//! nesting level. Canonicalisation is therefore mostly a matter of stripping
//! the chain-linkage fields before serialising, plus rejecting values that
//! cannot round-trip (non-finite floats, non-UTF-8 strings already excluded
//! by the type system).

use auditchain_model::event::CHAIN_FIELDS;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("value is not a JSON object at the top level")]
    NotAnObject,

    #[error("non-finite number at key '{key}'")]
    NonFiniteNumber { key: String },

    #[error("invalid head hash: {0}")]
    InvalidHeadHash(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reduce an event (or any serialisable value) to canonical bytes.
///
/// Strips the top-level keys in [`CHAIN_FIELDS`] before serialising, so the
/// caller can pass an already-annotated event without manually re-assembling
/// the pre-chain shape.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let mut json = serde_json::to_value(value)?;
    let obj = json.as_object_mut().ok_or(CanonicalError::NotAnObject)?;
    for field in CHAIN_FIELDS {
        obj.remove(field);
    }
    reject_non_finite(&json)?;
    Ok(serde_json::to_vec(&json)?)
}

/// Canonicalise a value that is already free of chain fields (e.g. a
/// checkpoint body), without stripping anything.
pub fn canonicalize_as_is<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let json = serde_json::to_value(value)?;
    reject_non_finite(&json)?;
    Ok(serde_json::to_vec(&json)?)
}

/// `serde_json::Number` cannot represent NaN or infinity at all —
/// `Number::from_f64` returns `None` for them, so a non-finite value can
/// never reach us as a `Value::Number` once it has passed through the
/// standard (non arbitrary-precision) JSON encoding. This walk is defence in
/// depth against that representation invariant changing, not the primary
/// guard.
fn reject_non_finite(value: &serde_json::Value) -> Result<(), CanonicalError> {
    walk(value, "$")
}

fn walk(value: &serde_json::Value, path: &str) -> Result<(), CanonicalError> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(CanonicalError::NonFiniteNumber {
                        key: path.to_string(),
                    });
                }
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                walk(v, &format!("{path}.{k}"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
