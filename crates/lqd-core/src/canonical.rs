//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the sole construction path for bytes used in digest
//! computation. The inner buffer is private, so a digest can never be taken
//! over an ad-hoc serialization.
//!
//! ## Coercion Rules
//!
//! 1. Reject floats. Amounts are integers.
//! 2. Sort object keys lexicographically.
//! 3. Use compact separators (no whitespace).

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value contains
    /// a floating point number, or `SerializationFailed` if it cannot be
    /// represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let coerced = coerce_json_value(value)?;
        Ok(Self(serde_json::to_vec(&coerced)?))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn coerce_json_value(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Number(n) => {
            if !n.is_i64() && !n.is_u64() {
                return Err(CanonicalizationError::FloatRejected(
                    n.as_f64().unwrap_or(f64::NAN),
                ));
            }
            Ok(Value::Number(n))
        }
        Value::Object(map) => {
            // serde_json::Map is BTreeMap-backed here, so rebuilding sorts keys.
            let mut coerced = serde_json::Map::new();
            for (k, v) in map {
                coerced.insert(k, coerce_json_value(v)?);
            }
            Ok(Value::Object(coerced))
        }
        Value::Array(arr) => Ok(Value::Array(
            arr.into_iter()
                .map(coerce_json_value)
                .collect::<Result<_, _>>()?,
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let bytes = CanonicalBytes::new(&json!({"b": 1, "a": [2, 3]})).unwrap();
        assert_eq!(bytes.as_bytes(), br#"{"a":[2,3],"b":1}"#);
    }

    #[test]
    fn floats_are_rejected() {
        let err = CanonicalBytes::new(&json!({"amount": 1.5})).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatRejected(_)));
    }

    #[test]
    fn nested_floats_are_rejected() {
        assert!(CanonicalBytes::new(&json!({"outer": {"inner": [0.25]}})).is_err());
    }
}
