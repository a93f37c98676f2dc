//! Per-project manifest: the cheap projection used for listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::system::System;

/// Small summary of one stored project, readable without opening its
/// metadata, indices, or payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Manifest {
    /// Project a manifest from a system.
    pub fn for_system(system: &System) -> Self {
        Self {
            id: system.id.clone(),
            name: system.name.clone(),
            updated_at: system.updated_at,
            kind: "system".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_type() {
        let manifest = Manifest {
            id: "sys-1".into(),
            name: "van der Pol".into(),
            updated_at: Utc::now(),
            kind: "system".into(),
        };
        let text = serde_json::to_string(&manifest).unwrap();
        assert!(text.contains(r#""type":"system""#));
        let back: Manifest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, manifest);
    }
}
