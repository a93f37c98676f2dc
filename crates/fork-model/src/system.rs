//! The System aggregate: metadata, entity maps, indices, and UI subtree.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::SystemIndex;

/// UI presentation state of a project: render tree, scenes, and diagrams.
///
/// Everything here is opaque to the storage layer; it is persisted as one
/// document (`ui.json`) and rewritten wholesale on every UI save.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    #[serde(default)]
    pub nodes: BTreeMap<String, Value>,
    #[serde(default)]
    pub root_ids: Vec<String>,
    #[serde(default)]
    pub scenes: Value,
    #[serde(default)]
    pub bifurcation_diagrams: Value,
    #[serde(default)]
    pub ui: Value,
}

/// The persisted `system.json` document: metadata without entities or UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetadata {
    pub id: String,
    pub name: String,
    /// Equation configuration, opaque to this layer.
    #[serde(default)]
    pub config: Value,
    pub updated_at: DateTime<Utc>,
}

/// One analysis project: the aggregate root handed to `save`/`save_ui`.
///
/// Entity payloads in `objects` and `branches` are opaque JSON values keyed
/// by entity id. A *skeleton* is a System whose entity maps are empty —
/// still a fully-typed, valid value; hydration only adds payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub config: Value,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub index: SystemIndex,
    #[serde(default)]
    pub objects: BTreeMap<String, Value>,
    #[serde(default)]
    pub branches: BTreeMap<String, Value>,
    #[serde(default)]
    pub ui: UiState,
}

impl System {
    /// Create a new empty system.
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config,
            updated_at: Utc::now(),
            index: SystemIndex::empty(),
            objects: BTreeMap::new(),
            branches: BTreeMap::new(),
            ui: UiState::default(),
        }
    }

    /// Project the metadata document.
    pub fn metadata(&self) -> SystemMetadata {
        SystemMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            config: self.config.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Rebuild a skeleton from its persisted documents.
    pub fn skeleton(metadata: SystemMetadata, ui: UiState, index: SystemIndex) -> Self {
        Self {
            id: metadata.id,
            name: metadata.name,
            config: metadata.config,
            updated_at: metadata.updated_at,
            index,
            objects: BTreeMap::new(),
            branches: BTreeMap::new(),
            ui,
        }
    }

    /// Returns `true` if every indexed entity has a payload in memory.
    pub fn is_hydrated(&self) -> bool {
        self.index.objects.keys().all(|id| self.objects.contains_key(id))
            && self.index.branches.keys().all(|id| self.branches.contains_key(id))
    }
}
