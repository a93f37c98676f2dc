//! Transactional key-value backend on redb.
//!
//! Two logical tables: `fork-data` for everything rewritten on full saves
//! (manifest, metadata, indices, entity payloads) and `fork-ui` for the
//! frequently-rewritten UI snapshots. A third `fork-meta` table holds the
//! store version.
//!
//! Opening a database whose stored version is *newer* than this build's
//! [`KV_STORE_VERSION`] deletes the file and recreates it empty. That is
//! deliberate data loss on downgrade, kept from the original design rather
//! than a migration gap; it is logged but never surfaced as an error.
//!
//! redb transactions here are single-key gets and puts, so trait methods
//! call into redb inline instead of routing through `spawn_blocking`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocKind, EntityKind, StorageBackend};

/// Version of the key/table layout this build writes and expects.
pub const KV_STORE_VERSION: u64 = 1;

/// Fixed database file name inside the backend directory.
pub const DB_FILE_NAME: &str = "fork-projects.redb";

const DATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("fork-data");
const UI_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("fork-ui");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("fork-meta");
const VERSION_KEY: &str = "storeVersion";

fn storage<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::StorageFailure(e.to_string())
}

/// Transactional-KV backend at a fixed database file.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl RedbBackend {
    /// Open (or create) the database under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            StoreError::BackendUnavailable(format!("cannot create {}: {e}", dir.display()))
        })?;
        let path = dir.join(DB_FILE_NAME);
        let mut db = Database::create(&path).map_err(|e| {
            StoreError::BackendUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;

        if let Some(found) = Self::stored_version(&db)? {
            if found > KV_STORE_VERSION {
                warn!(
                    found,
                    expected = KV_STORE_VERSION,
                    path = %path.display(),
                    "database version is newer than this build; deleting and recreating"
                );
                drop(db);
                std::fs::remove_file(&path)?;
                db = Database::create(&path).map_err(|e| {
                    StoreError::BackendUnavailable(format!(
                        "cannot recreate {}: {e}",
                        path.display()
                    ))
                })?;
            }
        }

        let backend = Self { db, path };
        backend.initialize()?;
        debug!(path = %backend.path.display(), "kv store open");
        Ok(backend)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stored_version(db: &Database) -> StoreResult<Option<u64>> {
        let txn = db.begin_read().map_err(storage)?;
        match txn.open_table(META_TABLE) {
            Ok(table) => Ok(table.get(VERSION_KEY).map_err(storage)?.map(|g| g.value())),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    /// Create all tables and record the store version.
    fn initialize(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut meta = txn.open_table(META_TABLE).map_err(storage)?;
            meta.insert(VERSION_KEY, KV_STORE_VERSION).map_err(storage)?;
            txn.open_table(DATA_TABLE).map_err(storage)?;
            txn.open_table(UI_TABLE).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        Ok(())
    }

    fn table_for(kind: DocKind) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match kind {
            DocKind::Ui => UI_TABLE,
            _ => DATA_TABLE,
        }
    }

    fn doc_key(system_id: &str, kind: DocKind) -> String {
        match kind {
            DocKind::Manifest => format!("{system_id}/manifest"),
            DocKind::Metadata => format!("{system_id}/system"),
            DocKind::Ui => format!("{system_id}/ui"),
            DocKind::ObjectIndex => format!("{system_id}/index/objects"),
            DocKind::BranchIndex => format!("{system_id}/index/branches"),
        }
    }

    fn payload_key(system_id: &str, kind: EntityKind, shard: &str, id: &str) -> String {
        format!("{system_id}/{}/{shard}/{id}", kind.dir())
    }

    fn get(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(storage)?;
        match txn.open_table(table) {
            Ok(t) => Ok(t.get(key).map_err(storage)?.map(|g| g.value().to_vec())),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    fn put(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        bytes: &[u8],
    ) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut t = txn.open_table(table).map_err(storage)?;
            t.insert(key, bytes).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        Ok(())
    }

    fn del(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut t = txn.open_table(table).map_err(storage)?;
            t.remove(key).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        Ok(())
    }

    /// Remove every key starting with `prefix` from both content tables.
    fn remove_prefix(&self, prefix: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(storage)?;
        for table_def in [DATA_TABLE, UI_TABLE] {
            let mut t = txn.open_table(table_def).map_err(storage)?;
            let keys: Vec<String> = t
                .range(prefix..)
                .map_err(storage)?
                .map_while(|item| match item {
                    Ok((key, _)) if key.value().starts_with(prefix) => {
                        Some(Ok(key.value().to_string()))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(storage(e))),
                })
                .collect::<StoreResult<_>>()?;
            for key in keys {
                t.remove(key.as_str()).map_err(storage)?;
            }
        }
        txn.commit().map_err(storage)?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RedbBackend {
    async fn list_systems(&self) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = match txn.open_table(DATA_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage(e)),
        };
        let mut ids = Vec::new();
        for item in table.iter().map_err(storage)? {
            let (key, _) = item.map_err(storage)?;
            // Manifest keys are exactly `{system}/manifest`; payload keys
            // have deeper paths and must not be mistaken for them.
            if let Some(id) = key.value().strip_suffix("/manifest") {
                if !id.contains('/') {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read_doc(&self, system_id: &str, kind: DocKind) -> StoreResult<Option<Vec<u8>>> {
        self.get(Self::table_for(kind), &Self::doc_key(system_id, kind))
    }

    async fn write_doc(&self, system_id: &str, kind: DocKind, bytes: &[u8]) -> StoreResult<()> {
        self.put(Self::table_for(kind), &Self::doc_key(system_id, kind), bytes)
    }

    async fn read_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        self.get(DATA_TABLE, &Self::payload_key(system_id, kind, shard, id))
    }

    async fn write_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
        bytes: &[u8],
    ) -> StoreResult<()> {
        self.put(DATA_TABLE, &Self::payload_key(system_id, kind, shard, id), bytes)
    }

    async fn delete_payload(
        &self,
        system_id: &str,
        kind: EntityKind,
        shard: &str,
        id: &str,
    ) -> StoreResult<()> {
        self.del(DATA_TABLE, &Self::payload_key(system_id, kind, shard, id))
    }

    async fn remove_system(&self, system_id: &str) -> StoreResult<()> {
        self.remove_prefix(&format!("{system_id}/"))
    }

    async fn clear(&self) -> StoreResult<()> {
        self.remove_prefix("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn docs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path()).unwrap();

        assert!(backend.read_doc("sys-1", DocKind::Metadata).await.unwrap().is_none());
        backend.write_doc("sys-1", DocKind::Metadata, b"meta").await.unwrap();
        assert_eq!(
            backend.read_doc("sys-1", DocKind::Metadata).await.unwrap().as_deref(),
            Some(b"meta".as_ref())
        );
    }

    #[tokio::test]
    async fn ui_lives_in_its_own_table() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path()).unwrap();
        backend.write_doc("sys-1", DocKind::Ui, b"ui").await.unwrap();

        // The data table must not see any sys-1 keys besides what was
        // written there.
        assert!(backend.list_systems().await.unwrap().is_empty());
        assert_eq!(
            backend.read_doc("sys-1", DocKind::Ui).await.unwrap().as_deref(),
            Some(b"ui".as_ref())
        );
    }

    #[tokio::test]
    async fn list_systems_from_manifest_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path()).unwrap();
        backend.write_doc("sys-b", DocKind::Manifest, b"{}").await.unwrap();
        backend.write_doc("sys-a", DocKind::Manifest, b"{}").await.unwrap();
        backend.write_doc("sys-a", DocKind::Metadata, b"{}").await.unwrap();
        assert_eq!(backend.list_systems().await.unwrap(), vec!["sys-a", "sys-b"]);
    }

    #[tokio::test]
    async fn remove_system_drops_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path()).unwrap();
        backend.write_doc("sys-1", DocKind::Manifest, b"{}").await.unwrap();
        backend.write_doc("sys-1", DocKind::Ui, b"ui").await.unwrap();
        backend
            .write_payload("sys-1", EntityKind::Object, "ab", "eq-1", b"{}")
            .await
            .unwrap();

        backend.remove_system("sys-1").await.unwrap();
        assert!(backend.list_systems().await.unwrap().is_empty());
        assert!(backend.read_doc("sys-1", DocKind::Ui).await.unwrap().is_none());
        assert!(backend
            .read_payload("sys-1", EntityKind::Object, "ab", "eq-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reopen_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = RedbBackend::open(dir.path()).unwrap();
            backend.write_doc("sys-1", DocKind::Manifest, b"{}").await.unwrap();
        }
        let backend = RedbBackend::open(dir.path()).unwrap();
        assert_eq!(backend.list_systems().await.unwrap(), vec!["sys-1"]);
    }

    #[tokio::test]
    async fn newer_version_on_disk_recreates_empty() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = RedbBackend::open(dir.path()).unwrap();
            backend.write_doc("sys-1", DocKind::Manifest, b"{}").await.unwrap();
        }
        // Stamp a future store version directly into the meta table.
        {
            let db = Database::create(dir.path().join(DB_FILE_NAME)).unwrap();
            let txn = db.begin_write().unwrap();
            {
                let mut meta = txn.open_table(META_TABLE).unwrap();
                meta.insert(VERSION_KEY, KV_STORE_VERSION + 1).unwrap();
            }
            txn.commit().unwrap();
        }

        // Opening must not error; it yields an empty, usable store.
        let backend = RedbBackend::open(dir.path()).unwrap();
        assert!(backend.list_systems().await.unwrap().is_empty());
        backend.write_doc("sys-2", DocKind::Manifest, b"{}").await.unwrap();
        assert_eq!(backend.list_systems().await.unwrap(), vec!["sys-2"]);
        assert_eq!(RedbBackend::stored_version(&backend.db).unwrap(), Some(KV_STORE_VERSION));
    }
}
