//! Per-entity index entries: small identity records kept apart from payloads.
//!
//! The index is the source of truth for *what exists* in a project; payload
//! stores are the source of truth for *content*. An entry's `updated_at`
//! moves only when identity metadata changes (name, type, parent/start
//! references), never on payload churn, so consumers can tell "this entity's
//! identity changed" apart from "its payload changed".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shard::shard_for;

/// Index entry for one analysis object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectIndexEntry {
    pub id: String,
    pub name: String,
    pub object_type: String,
    /// Storage bucket, assigned on first indexing and kept stable afterward.
    /// Absent in indices written before shards were recorded.
    #[serde(default)]
    pub shard: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Index entry for one continuation branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchIndexEntry {
    pub id: String,
    pub name: String,
    pub branch_type: String,
    /// Object this branch was continued from, if any.
    #[serde(default)]
    pub parent_object_id: Option<String>,
    /// Object the continuation started at, if any.
    #[serde(default)]
    pub start_object_id: Option<String>,
    #[serde(default)]
    pub shard: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Both entity indices of a System.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemIndex {
    #[serde(default)]
    pub objects: std::collections::BTreeMap<String, ObjectIndexEntry>,
    #[serde(default)]
    pub branches: std::collections::BTreeMap<String, BranchIndexEntry>,
}

fn payload_str(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn payload_opt_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

impl ObjectIndexEntry {
    /// Derive an entry from an opaque object payload.
    ///
    /// Reads only the identity fields (`name`, `objectType`); everything
    /// else in the payload stays uninterpreted.
    pub fn derive(id: &str, payload: &Value, shard: String, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: payload_str(payload, "name"),
            object_type: payload_str(payload, "objectType"),
            shard: Some(shard),
            updated_at,
        }
    }

    /// Whether identity metadata matches another entry (timestamps and shard
    /// assignment excluded).
    pub fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name && self.object_type == other.object_type
    }

    /// The entry's shard, recomputed from the id for legacy entries.
    pub fn resolved_shard(&self) -> String {
        self.shard.clone().unwrap_or_else(|| shard_for(&self.id))
    }
}

impl BranchIndexEntry {
    /// Derive an entry from an opaque branch payload.
    ///
    /// Identity fields for a branch include its relationship references
    /// (`parentObjectId`, `startObjectId`).
    pub fn derive(id: &str, payload: &Value, shard: String, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: payload_str(payload, "name"),
            branch_type: payload_str(payload, "branchType"),
            parent_object_id: payload_opt_str(payload, "parentObjectId"),
            start_object_id: payload_opt_str(payload, "startObjectId"),
            shard: Some(shard),
            updated_at,
        }
    }

    /// Whether identity metadata matches another entry.
    pub fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name
            && self.branch_type == other.branch_type
            && self.parent_object_id == other.parent_object_id
            && self.start_object_id == other.start_object_id
    }

    /// The entry's shard, recomputed from the id for legacy entries.
    pub fn resolved_shard(&self) -> String {
        self.shard.clone().unwrap_or_else(|| shard_for(&self.id))
    }
}

impl SystemIndex {
    /// An index with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of indexed entities across both kinds.
    pub fn len(&self) -> usize {
        self.objects.len() + self.branches.len()
    }

    /// Returns `true` if no entity is indexed.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.branches.is_empty()
    }
}
