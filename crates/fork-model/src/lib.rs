//! Data model for fork analysis projects.
//!
//! A *System* is the aggregate root of one analysis project: its equation
//! configuration, a growing set of computed analysis objects (equilibria,
//! limit cycles, ...) and continuation branches, and the UI presentation
//! subtree (nodes, scenes, bifurcation diagrams). This crate models only the
//! storage-relevant shape of a System; object and branch payloads are opaque
//! JSON values that the storage layer reads, writes, deletes, and compares —
//! never interprets beyond identity fields.
//!
//! # Key Types
//!
//! - [`System`] — aggregate root (metadata + indices + entity maps + UI)
//! - [`SystemIndex`] — per-entity index entries, the source of truth for
//!   *what exists*
//! - [`Manifest`] — cheap per-project summary used for listing
//! - [`Envelope`] — schema-versioned wrapper around every persisted document
//!
//! # Modules
//!
//! - [`shard`] — deterministic `entity id → bucket label` mapping
//! - [`canonical`] — canonical payload serialization for change detection

pub mod canonical;
pub mod envelope;
pub mod error;
pub mod index;
pub mod manifest;
pub mod shard;
pub mod system;

pub use canonical::{canonical_payload, normalize_payload, payloads_equal};
pub use envelope::{
    decode_envelope, encode_envelope, Envelope, ENTITY_SCHEMA_VERSION, INDEX_SCHEMA_VERSION,
    MANIFEST_SCHEMA_VERSION, SYSTEM_SCHEMA_VERSION, UI_SCHEMA_VERSION,
};
pub use error::{ModelError, ModelResult};
pub use index::{BranchIndexEntry, ObjectIndexEntry, SystemIndex};
pub use manifest::Manifest;
pub use shard::shard_for;
pub use system::{System, SystemMetadata, UiState};
