//! Schema-versioned envelope around every persisted document.
//!
//! Each document kind carries its own version constant so the UI snapshot
//! schema can evolve independently of, say, the entity payload schema. A
//! version mismatch on decode is a hard error — migrations are out of scope
//! and forward decoding is never attempted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// Schema version of the per-project manifest document.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;
/// Schema version of the system metadata document.
pub const SYSTEM_SCHEMA_VERSION: u32 = 1;
/// Schema version of the UI snapshot document.
pub const UI_SCHEMA_VERSION: u32 = 1;
/// Schema version of the object/branch index documents.
pub const INDEX_SCHEMA_VERSION: u32 = 1;
/// Schema version of individual entity payload documents.
pub const ENTITY_SCHEMA_VERSION: u32 = 1;

/// A persisted unit: explicit schema version plus the wrapped payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub schema_version: u32,
    pub payload: T,
}

/// Wrap `payload` in an envelope at `version` and serialize to JSON bytes.
pub fn encode_envelope<T: Serialize>(version: u32, payload: &T) -> ModelResult<Vec<u8>> {
    let envelope = Envelope {
        schema_version: version,
        payload,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode an envelope, requiring its version to equal `expected` exactly.
///
/// The version is checked before the payload is deserialized into `T`, so a
/// newer document whose payload shape changed still reports
/// [`ModelError::UnsupportedSchemaVersion`] rather than a parse error.
pub fn decode_envelope<T: DeserializeOwned>(expected: u32, bytes: &[u8]) -> ModelResult<T> {
    let raw: Envelope<Value> = serde_json::from_slice(bytes)?;
    if raw.schema_version != expected {
        return Err(ModelError::UnsupportedSchemaVersion {
            expected,
            found: raw.schema_version,
        });
    }
    Ok(serde_json::from_value(raw.payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip() {
        let bytes = encode_envelope(UI_SCHEMA_VERSION, &json!({"rootIds": []})).unwrap();
        let back: Value = decode_envelope(UI_SCHEMA_VERSION, &bytes).unwrap();
        assert_eq!(back, json!({"rootIds": []}));
    }

    #[test]
    fn version_mismatch_rejected() {
        let bytes = encode_envelope(7, &json!({"x": 1})).unwrap();
        let err = decode_envelope::<Value>(1, &bytes).unwrap_err();
        assert!(matches!(
            err,
            ModelError::UnsupportedSchemaVersion { expected: 1, found: 7 }
        ));
    }

    #[test]
    fn version_checked_before_payload_shape() {
        // A future version whose payload is a bare string must still fail
        // with the version error, not a deserialization error.
        let bytes = br#"{"schemaVersion": 99, "payload": "opaque-future-shape"}"#;
        let err = decode_envelope::<std::collections::BTreeMap<String, u32>>(1, bytes).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedSchemaVersion { .. }));
    }

    #[test]
    fn camel_case_on_the_wire() {
        let bytes = encode_envelope(1, &json!(null)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("schemaVersion"));
    }
}
