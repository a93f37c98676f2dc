use async_trait::async_trait;

use crate::error::StoreResult;

/// The skeleton documents a backend stores per system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocKind {
    Manifest,
    Metadata,
    Ui,
    ObjectIndex,
    BranchIndex,
}

impl DocKind {
    /// Path of this document relative to the system root, shared by the
    /// filesystem backend and the archive container layout.
    pub fn relative_path(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest.json",
            Self::Metadata => "system.json",
            Self::Ui => "ui.json",
            Self::ObjectIndex => "index/objects.json",
            Self::BranchIndex => "index/branches.json",
        }
    }
}

/// The two entity kinds a system stores payloads for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Object,
    Branch,
}

impl EntityKind {
    /// Top-level payload directory for this kind.
    pub fn dir(&self) -> &'static str {
        match self {
            Self::Object => "objects",
            Self::Branch => "branches",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir())
    }
}

/// Primitive storage operations implemented by each backend.
///
/// Backends move bytes at addressed locations and nothing else: all envelope
/// coding, index reconciliation, and differential-save logic lives above this
/// trait in [`SystemStore`], so the two persistent backends and the in-memory
/// test backend stay behaviorally identical.
///
/// Reads return `Ok(None)` for an absent document or payload; the caller
/// decides whether that is an error. All I/O failures are propagated, never
/// silently ignored.
///
/// [`SystemStore`]: crate::SystemStore
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Ids of all systems with any persisted document.
    async fn list_systems(&self) -> StoreResult<Vec<String>>;

    /// Read one skeleton document.
    async fn read_doc(&self, system_id: &str, kind: DocKind) -> StoreResult<Option<Vec<u8>>>;

    /// Write one skeleton document, replacing any previous content.
    async fn write_doc(&self, system_id: &str, kind: DocKind, bytes: &[u8]) -> StoreResult<()>;

    /// Read one entity payload at its shard.
    async fn read_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<Option<Vec<u8>>>;

    /// Write one entity payload at its shard, replacing any previous content.
    async fn write_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
        bytes: &[u8],
    ) -> StoreResult<()>;

    /// Delete one entity payload. Deleting an absent payload is a no-op.
    async fn delete_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<()>;

    /// Remove every document and payload of one system.
    async fn remove_system(&self, system_id: &str) -> StoreResult<()>;

    /// Remove every system this backend instance holds.
    async fn clear(&self) -> StoreResult<()>;
}
