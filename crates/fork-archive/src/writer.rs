//! Archive export: serialize a fully hydrated system into one tar container.

use tar::{Builder, Header};

use fork_model::{
    encode_envelope, normalize_payload, Manifest, System, ENTITY_SCHEMA_VERSION,
    INDEX_SCHEMA_VERSION, MANIFEST_SCHEMA_VERSION, SYSTEM_SCHEMA_VERSION, UI_SCHEMA_VERSION,
};

use crate::error::{ArchiveError, ArchiveResult};

/// Suggested download file name for a system's archive.
pub fn archive_filename(system: &System) -> String {
    let slug: String = system
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("{}.fork-system.tar", system.id)
    } else {
        format!("{slug}.fork-system.tar")
    }
}

fn append(builder: &mut Builder<Vec<u8>>, path: &str, bytes: &[u8]) -> ArchiveResult<()> {
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, bytes)?;
    Ok(())
}

/// Serialize a fully hydrated system into tar container bytes.
///
/// Every id in either index must have a payload in the corresponding entity
/// map; otherwise [`ArchiveError::MissingEntity`] is returned before any
/// bytes are produced.
pub fn write_archive(system: &System) -> ArchiveResult<Vec<u8>> {
    for id in system.index.objects.keys() {
        if !system.objects.contains_key(id) {
            return Err(ArchiveError::MissingEntity {
                kind: "objects",
                id: id.clone(),
            });
        }
    }
    for id in system.index.branches.keys() {
        if !system.branches.contains_key(id) {
            return Err(ArchiveError::MissingEntity {
                kind: "branches",
                id: id.clone(),
            });
        }
    }

    let mut builder = Builder::new(Vec::new());

    append(
        &mut builder,
        "manifest.json",
        &encode_envelope(MANIFEST_SCHEMA_VERSION, &Manifest::for_system(system))?,
    )?;
    append(
        &mut builder,
        "system.json",
        &encode_envelope(SYSTEM_SCHEMA_VERSION, &system.metadata())?,
    )?;
    append(
        &mut builder,
        "ui.json",
        &encode_envelope(UI_SCHEMA_VERSION, &system.ui)?,
    )?;
    append(
        &mut builder,
        "index/objects.json",
        &encode_envelope(INDEX_SCHEMA_VERSION, &system.index.objects)?,
    )?;
    append(
        &mut builder,
        "index/branches.json",
        &encode_envelope(INDEX_SCHEMA_VERSION, &system.index.branches)?,
    )?;

    for (id, entry) in &system.index.objects {
        let bytes = encode_envelope(ENTITY_SCHEMA_VERSION, &normalize_payload(id, &system.objects[id]))?;
        append(
            &mut builder,
            &format!("objects/{}/{id}.json", entry.resolved_shard()),
            &bytes,
        )?;
    }
    for (id, entry) in &system.index.branches {
        let bytes = encode_envelope(ENTITY_SCHEMA_VERSION, &normalize_payload(id, &system.branches[id]))?;
        append(
            &mut builder,
            &format!("branches/{}/{id}.json", entry.resolved_shard()),
            &bytes,
        )?;
    }

    Ok(builder.into_inner()?)
}
