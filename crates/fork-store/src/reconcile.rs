//! Index reconciliation: derive new index entries from in-memory entities
//! against the previously persisted index.
//!
//! Two rules, applied per entity:
//!
//! 1. A previously indexed entity keeps its shard assignment; a new entity
//!    gets one from [`shard_for`]. Shards are never recomputed after
//!    assignment (except as a fallback for legacy entries that lack one).
//! 2. An entry's `updated_at` moves to the system's current timestamp iff an
//!    identity field changed (name, type, parent/start references);
//!    otherwise the previous timestamp is kept. Payload-only edits leave the
//!    entry untouched, which is what lets the differential save treat
//!    metadata churn and payload churn independently.

use std::collections::BTreeMap;

use fork_model::{shard_for, BranchIndexEntry, ObjectIndexEntry, System, SystemIndex};

/// Reconcile the object index.
pub fn reconcile_objects(
    system: &System,
    previous: &BTreeMap<String, ObjectIndexEntry>,
) -> BTreeMap<String, ObjectIndexEntry> {
    system
        .objects
        .iter()
        .map(|(id, payload)| {
            let entry = match previous.get(id) {
                Some(prev) => {
                    let mut entry = ObjectIndexEntry::derive(
                        id,
                        payload,
                        prev.resolved_shard(),
                        system.updated_at,
                    );
                    if prev.same_identity(&entry) {
                        entry.updated_at = prev.updated_at;
                    }
                    entry
                }
                None => ObjectIndexEntry::derive(id, payload, shard_for(id), system.updated_at),
            };
            (id.clone(), entry)
        })
        .collect()
}

/// Reconcile the branch index.
pub fn reconcile_branches(
    system: &System,
    previous: &BTreeMap<String, BranchIndexEntry>,
) -> BTreeMap<String, BranchIndexEntry> {
    system
        .branches
        .iter()
        .map(|(id, payload)| {
            let entry = match previous.get(id) {
                Some(prev) => {
                    let mut entry = BranchIndexEntry::derive(
                        id,
                        payload,
                        prev.resolved_shard(),
                        system.updated_at,
                    );
                    if prev.same_identity(&entry) {
                        entry.updated_at = prev.updated_at;
                    }
                    entry
                }
                None => BranchIndexEntry::derive(id, payload, shard_for(id), system.updated_at),
            };
            (id.clone(), entry)
        })
        .collect()
}

/// Reconcile both indices at once.
pub fn reconcile_index(system: &System, previous: &SystemIndex) -> SystemIndex {
    SystemIndex {
        objects: reconcile_objects(system, &previous.objects),
        branches: reconcile_branches(system, &previous.branches),
    }
}
