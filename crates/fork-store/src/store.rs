//! Backend-agnostic store façade: skeleton loads, lazy hydration, and the
//! differential save.
//!
//! [`SystemStore`] owns every decision about *what* to read and write; the
//! backend underneath only moves bytes at addressed locations. This is what
//! keeps the filesystem, redb, and in-memory backends behaviorally
//! identical.
//!
//! There is no cross-location atomicity. Within one `save`, skeleton
//! documents are written first, then new/changed payloads, then deletes of
//! removed payloads — in that order, so an interruption can leave an index
//! entry whose payload was never written (hydration later skips that id) or
//! an orphaned payload (reclaimed by the next successful save), but never a
//! deleted payload that the just-written index still references.

use std::collections::BTreeMap;

use futures::future::{join_all, try_join_all};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use fork_model::{
    decode_envelope, encode_envelope, normalize_payload, payloads_equal, shard_for,
    BranchIndexEntry, Manifest, ObjectIndexEntry, System, SystemIndex, SystemMetadata, UiState,
    ENTITY_SCHEMA_VERSION, INDEX_SCHEMA_VERSION, MANIFEST_SCHEMA_VERSION, SYSTEM_SCHEMA_VERSION,
    UI_SCHEMA_VERSION,
};

use crate::error::{StoreError, StoreResult};
use crate::reconcile::reconcile_index;
use crate::traits::{DocKind, EntityKind, StorageBackend};

/// Result of a partial hydration request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HydratedEntities {
    pub objects: BTreeMap<String, Value>,
    pub branches: BTreeMap<String, Value>,
}

/// An exported project archive: suggested file name plus container bytes.
#[derive(Clone, Debug)]
pub struct SystemArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The project store: one instance per backend.
pub struct SystemStore<B> {
    backend: B,
}

impl<B: StorageBackend> SystemStore<B> {
    /// Create a store over the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Access the underlying backend (used by instrumented tests).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ---------------------------------------------------------------
    // Listing and loading
    // ---------------------------------------------------------------

    /// Summaries of every stored project.
    ///
    /// A project whose manifest is missing or unreadable is skipped with a
    /// warning rather than failing the whole listing.
    pub async fn list(&self) -> StoreResult<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for id in self.backend.list_systems().await? {
            match self
                .read_doc_decoded::<Manifest>(&id, DocKind::Manifest, MANIFEST_SCHEMA_VERSION)
                .await
            {
                Ok(Some(manifest)) => manifests.push(manifest),
                Ok(None) => warn!(system = %id, "stored system has no manifest; skipping"),
                Err(e) => warn!(system = %id, error = %e, "unreadable manifest; skipping"),
            }
        }
        Ok(manifests)
    }

    /// Load a project skeleton: metadata, UI snapshot, and both indices,
    /// with empty entity maps.
    ///
    /// Missing metadata or UI is [`StoreError::NotFound`]; missing index
    /// documents decode as empty indices (a project saved before it ever
    /// held entities has none).
    pub async fn load(&self, id: &str) -> StoreResult<System> {
        let metadata = self
            .read_doc_decoded::<SystemMetadata>(id, DocKind::Metadata, SYSTEM_SCHEMA_VERSION)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("system {id}")))?;
        let ui = self
            .read_doc_decoded::<UiState>(id, DocKind::Ui, UI_SCHEMA_VERSION)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ui snapshot for system {id}")))?;
        let index = self.read_index(id).await?;
        Ok(System::skeleton(metadata, ui, index))
    }

    /// Hydrate the requested entity payloads, one concurrent read per id.
    ///
    /// Shards are resolved from the persisted index, falling back to
    /// recomputation for ids the index does not know. A requested id whose
    /// payload is missing or undecodable is omitted from the result with a
    /// warning; the call itself succeeds.
    pub async fn load_entities(
        &self,
        id: &str,
        object_ids: &[String],
        branch_ids: &[String],
    ) -> StoreResult<HydratedEntities> {
        let index = self.read_index(id).await?;
        let object_shards: BTreeMap<String, String> = index
            .objects
            .iter()
            .map(|(eid, entry)| (eid.clone(), entry.resolved_shard()))
            .collect();
        let branch_shards: BTreeMap<String, String> = index
            .branches
            .iter()
            .map(|(eid, entry)| (eid.clone(), entry.resolved_shard()))
            .collect();

        let objects = self
            .hydrate(id, EntityKind::Object, object_ids, &object_shards)
            .await;
        let branches = self
            .hydrate(id, EntityKind::Branch, branch_ids, &branch_shards)
            .await;
        Ok(HydratedEntities { objects, branches })
    }

    // ---------------------------------------------------------------
    // Saving
    // ---------------------------------------------------------------

    /// Differential save: persist the skeleton documents, then exactly the
    /// entity payloads that are new or changed, then delete exactly the
    /// payloads whose entities were removed.
    pub async fn save(&self, system: &System) -> StoreResult<()> {
        let previous = self.read_index(&system.id).await?;
        let next = reconcile_index(system, &previous);

        // Removed: present in the old index, absent from the new one.
        // Deletes target the *old* shard assignment.
        let removed_objects: Vec<(String, String)> = previous
            .objects
            .values()
            .filter(|e| !next.objects.contains_key(&e.id))
            .map(|e| (e.id.clone(), e.resolved_shard()))
            .collect();
        let removed_branches: Vec<(String, String)> = previous
            .branches
            .values()
            .filter(|e| !next.branches.contains_key(&e.id))
            .map(|e| (e.id.clone(), e.resolved_shard()))
            .collect();

        let previous_object_shards: BTreeMap<String, String> = previous
            .objects
            .iter()
            .map(|(eid, entry)| (eid.clone(), entry.resolved_shard()))
            .collect();
        let previous_branch_shards: BTreeMap<String, String> = previous
            .branches
            .iter()
            .map(|(eid, entry)| (eid.clone(), entry.resolved_shard()))
            .collect();

        let changed_objects = self
            .new_or_changed(&system.id, EntityKind::Object, &system.objects, &previous_object_shards)
            .await;
        let changed_branches = self
            .new_or_changed(&system.id, EntityKind::Branch, &system.branches, &previous_branch_shards)
            .await;

        // Skeleton documents target disjoint locations; write concurrently.
        let metadata_bytes = encode_envelope(SYSTEM_SCHEMA_VERSION, &system.metadata())?;
        let ui_bytes = encode_envelope(UI_SCHEMA_VERSION, &system.ui)?;
        let object_index_bytes = encode_envelope(INDEX_SCHEMA_VERSION, &next.objects)?;
        let branch_index_bytes = encode_envelope(INDEX_SCHEMA_VERSION, &next.branches)?;
        let manifest_bytes = encode_envelope(MANIFEST_SCHEMA_VERSION, &Manifest::for_system(system))?;

        let id = system.id.as_str();
        tokio::try_join!(
            self.backend.write_doc(id, DocKind::Metadata, &metadata_bytes),
            self.backend.write_doc(id, DocKind::Ui, &ui_bytes),
            self.backend.write_doc(id, DocKind::ObjectIndex, &object_index_bytes),
            self.backend.write_doc(id, DocKind::BranchIndex, &branch_index_bytes),
            self.backend.write_doc(id, DocKind::Manifest, &manifest_bytes),
        )?;

        // Payload writes at the (possibly newly assigned) shard. A changed
        // entity with a stable shard overwrites in place; no delete is paired
        // with it.
        let mut writes: Vec<(EntityKind, String, String, Vec<u8>)> = Vec::new();
        for eid in &changed_objects {
            let bytes = encode_envelope(
                ENTITY_SCHEMA_VERSION,
                &normalize_payload(eid, &system.objects[eid]),
            )?;
            writes.push((EntityKind::Object, next.objects[eid].resolved_shard(), eid.clone(), bytes));
        }
        for eid in &changed_branches {
            let bytes = encode_envelope(
                ENTITY_SCHEMA_VERSION,
                &normalize_payload(eid, &system.branches[eid]),
            )?;
            writes.push((EntityKind::Branch, next.branches[eid].resolved_shard(), eid.clone(), bytes));
        }
        try_join_all(writes.iter().map(|(kind, shard, eid, bytes)| {
            self.backend.write_payload(id, *kind, shard, eid, bytes)
        }))
        .await?;

        // Deletes come strictly after the writes above.
        try_join_all(
            removed_objects
                .iter()
                .map(|(eid, shard)| self.backend.delete_payload(id, EntityKind::Object, shard, eid))
                .chain(removed_branches.iter().map(|(eid, shard)| {
                    self.backend.delete_payload(id, EntityKind::Branch, shard, eid)
                })),
        )
        .await?;

        debug!(
            system = %id,
            objects_written = changed_objects.len(),
            branches_written = changed_branches.len(),
            removed = removed_objects.len() + removed_branches.len(),
            "differential save complete"
        );
        Ok(())
    }

    /// Persist only the UI snapshot and the manifest.
    ///
    /// The manifest's `updated_at` becomes the later of the previously
    /// stored manifest's and the system's. Metadata, indices, and entity
    /// payloads are never touched.
    pub async fn save_ui(&self, system: &System) -> StoreResult<()> {
        let mut manifest = Manifest::for_system(system);
        if let Some(previous) = self
            .read_doc_decoded::<Manifest>(&system.id, DocKind::Manifest, MANIFEST_SCHEMA_VERSION)
            .await?
        {
            manifest.updated_at = manifest.updated_at.max(previous.updated_at);
        }

        let ui_bytes = encode_envelope(UI_SCHEMA_VERSION, &system.ui)?;
        let manifest_bytes = encode_envelope(MANIFEST_SCHEMA_VERSION, &manifest)?;
        let id = system.id.as_str();
        tokio::try_join!(
            self.backend.write_doc(id, DocKind::Ui, &ui_bytes),
            self.backend.write_doc(id, DocKind::Manifest, &manifest_bytes),
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------

    /// Remove one project entirely. Removing an absent project is a no-op.
    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        self.backend.remove_system(id).await
    }

    /// Remove every project this store instance holds.
    pub async fn clear(&self) -> StoreResult<()> {
        self.backend.clear().await
    }

    // ---------------------------------------------------------------
    // Archives
    // ---------------------------------------------------------------

    /// Export one project as a portable archive: skeleton plus every
    /// indexed entity payload.
    ///
    /// Fails if an indexed payload cannot be read — an archive is always
    /// fully hydrated.
    pub async fn export_archive(&self, id: &str) -> StoreResult<SystemArchive> {
        let mut system = self.load(id).await?;
        let object_ids: Vec<String> = system.index.objects.keys().cloned().collect();
        let branch_ids: Vec<String> = system.index.branches.keys().cloned().collect();
        let entities = self.load_entities(id, &object_ids, &branch_ids).await?;
        system.objects = entities.objects;
        system.branches = entities.branches;

        let bytes = fork_archive::write_archive(&system)?;
        Ok(SystemArchive {
            filename: fork_archive::archive_filename(&system),
            bytes,
        })
    }

    /// Import a project archive into this backend and return the hydrated
    /// system. Nothing is persisted if decoding fails.
    pub async fn import_archive(&self, bytes: &[u8]) -> StoreResult<System> {
        let system = fork_archive::read_archive(bytes)?;
        self.save(&system).await?;
        Ok(system)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    async fn read_doc_decoded<T: DeserializeOwned>(
        &self,
        system_id: &str,
        kind: DocKind,
        version: u32,
    ) -> StoreResult<Option<T>> {
        match self.backend.read_doc(system_id, kind).await? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode_envelope(version, &bytes)?)),
        }
    }

    async fn read_index(&self, system_id: &str) -> StoreResult<SystemIndex> {
        let objects = self
            .read_doc_decoded::<BTreeMap<String, ObjectIndexEntry>>(
                system_id,
                DocKind::ObjectIndex,
                INDEX_SCHEMA_VERSION,
            )
            .await?
            .unwrap_or_default();
        let branches = self
            .read_doc_decoded::<BTreeMap<String, BranchIndexEntry>>(
                system_id,
                DocKind::BranchIndex,
                INDEX_SCHEMA_VERSION,
            )
            .await?
            .unwrap_or_default();
        Ok(SystemIndex { objects, branches })
    }

    async fn hydrate(
        &self,
        system_id: &str,
        kind: EntityKind,
        ids: &[String],
        shards: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Value> {
        let reads = ids.iter().map(|id| {
            let shard = shards.get(id).cloned().unwrap_or_else(|| shard_for(id));
            async move {
                let read = self.backend.read_payload(system_id, kind, &shard, id).await;
                (id, read)
            }
        });

        let mut out = BTreeMap::new();
        for (id, read) in join_all(reads).await {
            match read {
                Ok(Some(bytes)) => match decode_envelope::<Value>(ENTITY_SCHEMA_VERSION, &bytes) {
                    Ok(payload) => {
                        out.insert(id.clone(), payload);
                    }
                    Err(e) => {
                        warn!(system = %system_id, kind = %kind, id = %id, error = %e,
                              "undecodable payload; skipping")
                    }
                },
                Ok(None) => {
                    warn!(system = %system_id, kind = %kind, id = %id, "payload missing; skipping")
                }
                Err(e) => {
                    warn!(system = %system_id, kind = %kind, id = %id, error = %e,
                          "payload unreadable; skipping")
                }
            }
        }
        out
    }

    /// Ids whose payloads must be written: everything not in the previous
    /// index, plus everything whose persisted content differs canonically
    /// from the in-memory content. A persisted payload that cannot be read
    /// or decoded counts as changed.
    async fn new_or_changed(
        &self,
        system_id: &str,
        kind: EntityKind,
        current: &BTreeMap<String, Value>,
        previous_shards: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let checks = current.iter().map(|(id, payload)| {
            let prev_shard = previous_shards.get(id).cloned();
            async move {
                let changed = match prev_shard {
                    None => true,
                    Some(shard) => {
                        match self.backend.read_payload(system_id, kind, &shard, id).await {
                            Ok(Some(bytes)) => {
                                match decode_envelope::<Value>(ENTITY_SCHEMA_VERSION, &bytes) {
                                    Ok(stored) => !payloads_equal(id, &stored, payload)
                                        .unwrap_or(false),
                                    Err(_) => true,
                                }
                            }
                            Ok(None) | Err(_) => true,
                        }
                    }
                };
                (id.clone(), changed)
            }
        });
        join_all(checks)
            .await
            .into_iter()
            .filter(|(_, changed)| *changed)
            .map(|(id, _)| id)
            .collect()
    }
}
