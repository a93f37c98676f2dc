//! In-memory backend for tests and deterministic mode.
//!
//! Documents and payloads are byte vectors behind a `RwLock`, copied on
//! every read and write so no caller can alias stored state. Per-location
//! write and delete counters let tests assert the minimal-writes property
//! of the differential save.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::traits::{DocKind, EntityKind, StorageBackend};

#[derive(Default)]
struct MemoryInner {
    /// `{system}/{doc path}` → document bytes.
    docs: HashMap<String, Vec<u8>>,
    /// `{system}/{kind}/{shard}/{id}` → payload bytes.
    payloads: HashMap<String, Vec<u8>>,
    /// Write counts per doc key and per `{system}/{kind}/{id}`.
    write_counts: HashMap<String, u64>,
    /// Delete counts per `{system}/{kind}/{id}`.
    delete_counts: HashMap<String, u64>,
}

/// In-memory, HashMap-based backend.
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<MemoryInner>,
}

fn doc_key(system_id: &str, kind: DocKind) -> String {
    format!("{system_id}/{}", kind.relative_path())
}

fn payload_key(system_id: &str, kind: EntityKind, shard: &str, id: &str) -> String {
    format!("{system_id}/{}/{shard}/{id}", kind.dir())
}

fn count_key(system_id: &str, kind: EntityKind, id: &str) -> String {
    format!("{system_id}/{}/{id}", kind.dir())
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a given entity payload has been written, across all
    /// shards it was ever written at.
    pub fn payload_write_count(&self, system_id: &str, kind: EntityKind, id: &str) -> u64 {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .write_counts
            .get(&count_key(system_id, kind, id))
            .copied()
            .unwrap_or(0)
    }

    /// How many times a given entity payload has been deleted.
    pub fn payload_delete_count(&self, system_id: &str, kind: EntityKind, id: &str) -> u64 {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .delete_counts
            .get(&count_key(system_id, kind, id))
            .copied()
            .unwrap_or(0)
    }

    /// How many times a skeleton document has been written.
    pub fn doc_write_count(&self, system_id: &str, kind: DocKind) -> u64 {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .write_counts
            .get(&doc_key(system_id, kind))
            .copied()
            .unwrap_or(0)
    }

    /// Number of payloads currently stored.
    pub fn payload_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").payloads.len()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("lock poisoned");
        f.debug_struct("MemoryBackend")
            .field("docs", &inner.docs.len())
            .field("payloads", &inner.payloads.len())
            .finish()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_systems(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut ids: Vec<String> = inner
            .docs
            .keys()
            .filter_map(|key| key.strip_suffix("/manifest.json"))
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn read_doc(&self, system_id: &str, kind: DocKind) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.docs.get(&doc_key(system_id, kind)).cloned())
    }

    async fn write_doc(&self, system_id: &str, kind: DocKind, bytes: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let key = doc_key(system_id, kind);
        *inner.write_counts.entry(key.clone()).or_insert(0) += 1;
        inner.docs.insert(key, bytes.to_vec());
        Ok(())
    }

    async fn read_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .payloads
            .get(&payload_key(system_id, kind, shard, id))
            .cloned())
    }

    async fn write_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
        bytes: &[u8],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        *inner
            .write_counts
            .entry(count_key(system_id, kind, id))
            .or_insert(0) += 1;
        inner
            .payloads
            .insert(payload_key(system_id, kind, shard, id), bytes.to_vec());
        Ok(())
    }

    async fn delete_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        *inner
            .delete_counts
            .entry(count_key(system_id, kind, id))
            .or_insert(0) += 1;
        inner.payloads.remove(&payload_key(system_id, kind, shard, id));
        Ok(())
    }

    async fn remove_system(&self, system_id: &str) -> StoreResult<()> {
        let prefix = format!("{system_id}/");
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.docs.retain(|key, _| !key.starts_with(&prefix));
        inner.payloads.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.docs.clear();
        inner.payloads.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn docs_roundtrip_and_count() {
        let backend = MemoryBackend::new();
        assert!(backend.read_doc("sys-1", DocKind::Manifest).await.unwrap().is_none());

        backend.write_doc("sys-1", DocKind::Manifest, b"m1").await.unwrap();
        backend.write_doc("sys-1", DocKind::Manifest, b"m2").await.unwrap();
        assert_eq!(
            backend.read_doc("sys-1", DocKind::Manifest).await.unwrap().as_deref(),
            Some(b"m2".as_ref())
        );
        assert_eq!(backend.doc_write_count("sys-1", DocKind::Manifest), 2);
    }

    #[tokio::test]
    async fn payload_read_is_shard_exact() {
        let backend = MemoryBackend::new();
        backend
            .write_payload("sys-1", EntityKind::Object, "ab", "eq-1", b"p")
            .await
            .unwrap();
        // Same id at a different shard is a different location.
        assert!(backend
            .read_payload("sys-1", EntityKind::Object, "cd", "eq-1")
            .await
            .unwrap()
            .is_none());
        assert!(backend
            .read_payload("sys-1", EntityKind::Object, "ab", "eq-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn remove_system_is_scoped() {
        let backend = MemoryBackend::new();
        backend.write_doc("sys-1", DocKind::Manifest, b"a").await.unwrap();
        backend.write_doc("sys-2", DocKind::Manifest, b"b").await.unwrap();
        backend
            .write_payload("sys-1", EntityKind::Branch, "ab", "br-1", b"p")
            .await
            .unwrap();

        backend.remove_system("sys-1").await.unwrap();
        assert_eq!(backend.list_systems().await.unwrap(), vec!["sys-2".to_string()]);
        assert_eq!(backend.payload_count(), 0);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let backend = MemoryBackend::new();
        backend.write_doc("sys-1", DocKind::Ui, b"u").await.unwrap();
        backend.write_doc("sys-2", DocKind::Ui, b"u").await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.list_systems().await.unwrap().is_empty());
    }
}
