//! Deterministic ("canonical") JSON encoding.
//!
//! This is the sole hashing/signing input for the whole protocol: object
//! keys are emitted in declaration order (not sorted), floats that are
//! non-finite are rejected, and integers never carry a fractional part.
//!
//! Declaration order is obtained for free: every type that gets canonicalised
//! is a `#[derive(Serialize)]` struct whose fields are declared in the order
//! the wire format requires, and `serde_json`'s `preserve_order` feature
//! keeps `serde_json::Value::Object` iteration in insertion order, so
//! `serde_json::to_value` followed by our own recursive emitter reproduces
//! that order byte-for-byte.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::CoreError;

/// Serialize `value` to its canonical-JSON string form.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let v = serde_json::to_value(value)?;
    canonicalize(&v)
}

/// Serialize `value` to canonical-JSON UTF-8 bytes (the hashing/signing input).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    Ok(to_canonical_string(value)?.into_bytes())
}

fn canonicalize(v: &Value) -> Result<String, CoreError> {
    match v {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => canonicalize_number(n),
        Value::String(s) => {
            serde_json::to_string(s).map_err(|e| CoreError::Serialization(e.to_string()))
        }
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(canonicalize(item)?);
            }
            Ok(format!("[{}]", parts.join(",")))
        }
        Value::Object(map) => {
            let mut parts = Vec::with_capacity(map.len());
            for (k, v) in map.iter() {
                let key = serde_json::to_string(k)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                parts.push(format!("{}:{}", key, canonicalize(v)?));
            }
            Ok(format!("{{{}}}", parts.join(",")))
        }
    }
}

fn canonicalize_number(n: &Number) -> Result<String, CoreError> {
    if let Some(i) = n.as_i64() {
        return Ok(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.to_string());
    }
    if let Some(f) = n.as_f64() {
        if !f.is_finite() {
            return Err(CoreError::Malformed(
                "non-finite float in canonical-JSON input".into(),
            ));
        }
        // Integral floats are emitted without a fractional part.
        if f.fract() == 0.0 && f.abs() < 1e15 {
            return Ok(format!("{}", f as i64));
        }
        return serde_json::to_string(&f).map_err(|e| CoreError::Serialization(e.to_string()));
    }
    Err(CoreError::Malformed("unrepresentable number".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Ordered {
        b: u32,
        a: u32,
    }

    #[test]
    fn preserves_declaration_order() {
        let s = to_canonical_string(&Ordered { b: 1, a: 2 }).unwrap();
        assert_eq!(s, r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn integral_float_has_no_fractional_part() {
        let v = serde_json::json!({"score": 1.0});
        assert_eq!(canonicalize(&v).unwrap(), r#"{"score":1}"#);
    }

    #[test]
    fn fractional_float_round_trips() {
        let v = serde_json::json!({"score": 0.75});
        assert_eq!(canonicalize(&v).unwrap(), r#"{"score":0.75}"#);
    }

    #[test]
    fn empty_object_is_empty_braces() {
        let v = serde_json::json!({});
        assert_eq!(canonicalize(&v).unwrap(), "{}");
    }
}
