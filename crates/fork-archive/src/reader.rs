//! Archive import: rebuild a fully hydrated system from container bytes.

use std::collections::BTreeMap;
use std::io::Read;

use serde_json::Value;
use tracing::warn;

use fork_model::{
    decode_envelope, BranchIndexEntry, Manifest, ObjectIndexEntry, System, SystemIndex,
    SystemMetadata, UiState, ENTITY_SCHEMA_VERSION, INDEX_SCHEMA_VERSION,
    MANIFEST_SCHEMA_VERSION, SYSTEM_SCHEMA_VERSION, UI_SCHEMA_VERSION,
};

use crate::error::{ArchiveError, ArchiveResult};

fn required<'a>(
    entries: &'a BTreeMap<String, Vec<u8>>,
    path: &'static str,
) -> ArchiveResult<&'a [u8]> {
    entries
        .get(path)
        .map(Vec::as_slice)
        .ok_or(ArchiveError::MissingDocument(path))
}

/// Parse an entity payload path of the form `{kind}/{shard}/{id}.json`.
fn entity_id(rest: &str) -> Option<&str> {
    let (_shard, file) = rest.split_once('/')?;
    let id = file.strip_suffix(".json")?;
    if id.is_empty() || file.contains('/') {
        return None;
    }
    Some(id)
}

/// Deserialize a tar container into a fully hydrated system.
///
/// The manifest envelope is decoded first: a container produced by an
/// incompatible schema is rejected before anything is constructed, so a
/// failed import never partially materializes. Unknown entry paths are
/// ignored with a warning.
pub fn read_archive(bytes: &[u8]) -> ArchiveResult<System> {
    let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut archive = tar::Archive::new(bytes);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        entries.insert(path, buf);
    }

    // Version gate on the manifest before any other decoding.
    let _manifest: Manifest =
        decode_envelope(MANIFEST_SCHEMA_VERSION, required(&entries, "manifest.json")?)?;

    let metadata: SystemMetadata =
        decode_envelope(SYSTEM_SCHEMA_VERSION, required(&entries, "system.json")?)?;
    let ui: UiState = decode_envelope(UI_SCHEMA_VERSION, required(&entries, "ui.json")?)?;
    let objects: BTreeMap<String, ObjectIndexEntry> = decode_envelope(
        INDEX_SCHEMA_VERSION,
        required(&entries, "index/objects.json")?,
    )?;
    let branches: BTreeMap<String, BranchIndexEntry> = decode_envelope(
        INDEX_SCHEMA_VERSION,
        required(&entries, "index/branches.json")?,
    )?;

    let mut system = System::skeleton(metadata, ui, SystemIndex { objects, branches });

    for (path, bytes) in &entries {
        let (kind, rest) = if let Some(rest) = path.strip_prefix("objects/") {
            ("objects", rest)
        } else if let Some(rest) = path.strip_prefix("branches/") {
            ("branches", rest)
        } else {
            if !matches!(
                path.as_str(),
                "manifest.json" | "system.json" | "ui.json" | "index/objects.json"
                    | "index/branches.json"
            ) {
                warn!(path = %path, "unknown archive entry; ignoring");
            }
            continue;
        };

        let id = entity_id(rest).ok_or_else(|| {
            ArchiveError::MalformedEntry(format!("unexpected payload path: {path}"))
        })?;
        let payload: Value = decode_envelope(ENTITY_SCHEMA_VERSION, bytes)?;
        match kind {
            "objects" => system.objects.insert(id.to_string(), payload),
            _ => system.branches.insert(id.to_string(), payload),
        };
    }

    Ok(system)
}
