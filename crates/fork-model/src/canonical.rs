//! Canonical payload serialization for change detection.
//!
//! The differential save decides whether an entity payload changed by
//! comparing serialized text, so serialization must be canonical: with
//! `serde_json`'s default (BTreeMap-backed) map type, object keys serialize
//! in sorted order regardless of insertion order. The one normalization this
//! layer applies is forcing the payload's `id` field to the entity's id, so
//! a persisted copy and an in-memory copy always agree on it.

use serde_json::Value;

use crate::error::ModelResult;

/// The `{...payload, id}` normalization: object payloads get their `id`
/// field overwritten with the entity id; non-object payloads pass through.
///
/// Persisted payloads are written in this form, so a payload read back is
/// always self-identifying.
pub fn normalize_payload(id: &str, payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert("id".to_string(), Value::String(id.to_string()));
            Value::Object(map)
        }
        other => other.clone(),
    }
}

/// Serialize a payload canonically under the given entity id.
pub fn canonical_payload(id: &str, payload: &Value) -> ModelResult<String> {
    Ok(serde_json::to_string(&normalize_payload(id, payload))?)
}

/// Whether two payloads for the same entity are canonically equal.
pub fn payloads_equal(id: &str, a: &Value, b: &Value) -> ModelResult<bool> {
    Ok(canonical_payload(id, a)? == canonical_payload(id, b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"name":"eq","data":[1,2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"data":[1,2],"name":"eq"}"#).unwrap();
        assert!(payloads_equal("x", &a, &b).unwrap());
    }

    #[test]
    fn id_is_normalized() {
        let stored = json!({"name": "eq", "id": "old-id"});
        let in_memory = json!({"name": "eq"});
        assert!(payloads_equal("eq-1", &stored, &in_memory).unwrap());
    }

    #[test]
    fn value_differences_detected() {
        let a = json!({"name": "eq", "points": [1.0, 2.0]});
        let b = json!({"name": "eq", "points": [1.0, 2.5]});
        assert!(!payloads_equal("eq-1", &a, &b).unwrap());
    }

    #[test]
    fn non_object_payloads_compare_as_is() {
        assert!(payloads_equal("x", &json!([1, 2, 3]), &json!([1, 2, 3])).unwrap());
        assert!(!payloads_equal("x", &json!([1, 2, 3]), &json!([3, 2, 1])).unwrap());
    }
}
