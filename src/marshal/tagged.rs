//! The canonical tagged serialization: a JSON document per value.
//!
//! ```text
//!   {"type":"date","value":"2011-07-09"}
//!   {"type":"array","value":[{"type":"integer","value":1},{"type":"nil"}]}
//! ```

use super::value::Value;
use crate::errors::{CodecError, Result};

/// Serialize `value` as tagged JSON.
///
/// JSON has no representation for NaN or infinities, so non-finite floats
/// are rejected instead of silently becoming `null`.
pub fn to_bytes(value: &Value) -> Result<Vec<u8>> {
    ensure_finite(value)?;
    serde_json::to_vec(value)
        .map_err(|e| CodecError::SerializationFailed(format!("tagged value: {e}")))
}

/// Parse tagged JSON back into a value.
pub fn from_bytes(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| CodecError::DeserializationFailed(format!("tagged value: {e}")))
}

fn ensure_finite(value: &Value) -> Result<()> {
    match value {
        Value::Float(x) if !x.is_finite() => Err(CodecError::SerializationFailed(format!(
            "the tagged format cannot store the float {x}"
        ))),
        Value::Array(items) => items.iter().try_for_each(ensure_finite),
        Value::Map(pairs) => pairs.iter().try_for_each(|(k, v)| {
            ensure_finite(k)?;
            ensure_finite(v)
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn date_is_written_as_iso_string() {
        let date = NaiveDate::from_ymd_opt(2011, 7, 9).unwrap();
        let bytes = to_bytes(&Value::Date(date)).unwrap();
        assert_eq!(bytes, br#"{"type":"date","value":"2011-07-09"}"#);
    }

    #[test]
    fn nil_has_no_value_field() {
        assert_eq!(to_bytes(&Value::Nil).unwrap(), br#"{"type":"nil"}"#);
        assert_eq!(from_bytes(br#"{"type":"nil"}"#).unwrap(), Value::Nil);
    }

    #[test]
    fn nested_non_finite_floats_are_rejected() {
        let value = Value::Array(vec![Value::Integer(1), Value::Float(f64::NAN)]);
        assert!(matches!(
            to_bytes(&value),
            Err(CodecError::SerializationFailed(_))
        ));
    }

    #[test]
    fn unknown_type_tag_fails() {
        assert!(matches!(
            from_bytes(br#"{"type":"time","value":"12:00"}"#),
            Err(CodecError::DeserializationFailed(_))
        ));
    }
}
