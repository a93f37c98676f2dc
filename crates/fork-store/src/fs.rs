//! Filesystem backend: one directory per project under a fixed root.
//!
//! Layout per system id (identical to the archive container layout):
//!
//! ```text
//! {root}/{system-id}/manifest.json
//! {root}/{system-id}/system.json
//! {root}/{system-id}/ui.json
//! {root}/{system-id}/index/objects.json
//! {root}/{system-id}/index/branches.json
//! {root}/{system-id}/objects/{shard}/{id}.json
//! {root}/{system-id}/branches/{shard}/{id}.json
//! ```
//!
//! Directories are created explicitly before each write; nothing is created
//! implicitly on read. System and entity ids are used as path components
//! verbatim — the application generates them from a path-safe alphabet.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocKind, EntityKind, StorageBackend};

/// Hierarchical-store backend rooted at one directory.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Open a backend at `root`, creating the root directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::BackendUnavailable(format!(
                "cannot create store root {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn system_dir(&self, system_id: &str) -> PathBuf {
        self.root.join(system_id)
    }

    fn doc_path(&self, system_id: &str, kind: DocKind) -> PathBuf {
        self.system_dir(system_id).join(kind.relative_path())
    }

    fn payload_path(&self, system_id: &str, kind: EntityKind, shard: &str, id: &str) -> PathBuf {
        self.system_dir(system_id)
            .join(kind.dir())
            .join(shard)
            .join(format!("{id}.json"))
    }
}

async fn read_opt(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_ensuring_parent(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes).await?;
    Ok(())
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn list_systems(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read_doc(&self, system_id: &str, kind: DocKind) -> StoreResult<Option<Vec<u8>>> {
        read_opt(&self.doc_path(system_id, kind)).await
    }

    async fn write_doc(&self, system_id: &str, kind: DocKind, bytes: &[u8]) -> StoreResult<()> {
        write_ensuring_parent(&self.doc_path(system_id, kind), bytes).await
    }

    async fn read_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        read_opt(&self.payload_path(system_id, kind, shard, id)).await
    }

    async fn write_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
        bytes: &[u8],
    ) -> StoreResult<()> {
        write_ensuring_parent(&self.payload_path(system_id, kind, shard, id), bytes).await
    }

    async fn delete_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<()> {
        match fs::remove_file(self.payload_path(system_id, kind, shard, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_system(&self, system_id: &str) -> StoreResult<()> {
        match fs::remove_dir_all(self.system_dir(system_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn docs_live_at_fixed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();

        backend.write_doc("sys-1", DocKind::ObjectIndex, b"{}").await.unwrap();
        assert!(dir.path().join("sys-1/index/objects.json").is_file());

        backend
            .write_payload("sys-1", EntityKind::Object, "ab", "eq-1", b"{}")
            .await
            .unwrap();
        assert!(dir.path().join("sys-1/objects/ab/eq-1.json").is_file());
    }

    #[tokio::test]
    async fn read_missing_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        assert!(backend.read_doc("nope", DocKind::Manifest).await.unwrap().is_none());
        assert!(backend
            .read_payload("nope", EntityKind::Branch, "ab", "br-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_missing_payload_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend
            .delete_payload("sys-1", EntityKind::Object, "ab", "eq-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_systems_reads_directories() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend.write_doc("sys-b", DocKind::Manifest, b"{}").await.unwrap();
        backend.write_doc("sys-a", DocKind::Manifest, b"{}").await.unwrap();
        assert_eq!(backend.list_systems().await.unwrap(), vec!["sys-a", "sys-b"]);
    }

    #[tokio::test]
    async fn remove_system_deletes_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend.write_doc("sys-1", DocKind::Manifest, b"{}").await.unwrap();
        backend
            .write_payload("sys-1", EntityKind::Object, "ab", "eq-1", b"{}")
            .await
            .unwrap();

        backend.remove_system("sys-1").await.unwrap();
        assert!(!dir.path().join("sys-1").exists());
        assert!(backend.list_systems().await.unwrap().is_empty());
    }
}
