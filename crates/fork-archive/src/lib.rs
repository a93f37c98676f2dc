//! Portable archive format for fork analysis projects.
//!
//! An archive is one tar container holding a fully hydrated system under
//! the same path conventions the filesystem backend uses:
//!
//! ```text
//! manifest.json
//! system.json
//! ui.json
//! index/objects.json
//! index/branches.json
//! objects/{shard}/{id}.json
//! branches/{shard}/{id}.json
//! ```
//!
//! Every entry is a schema-versioned envelope. The archive is the only
//! cross-backend transfer mechanism: exporting from one backend and
//! importing into another reconstructs the system exactly, including every
//! cross-reference and UI override.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{ArchiveError, ArchiveResult};
pub use reader::read_archive;
pub use writer::{archive_filename, write_archive};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Value};

    use fork_model::{
        encode_envelope, shard_for, BranchIndexEntry, Manifest, ObjectIndexEntry, System,
    };

    fn sample_system() -> System {
        let mut system = System::new("sys-1", "van der Pol", json!({"equations": ["x' = y"]}));
        system.ui.root_ids = vec!["node-eq-1".into()];
        system.ui.nodes.insert("node-eq-1".into(), json!({"renderStyle": {"color": "#ff0000"}}));
        system.ui.bifurcation_diagrams = json!([{"xAxis": "mu", "yAxis": "x"}]);

        let object = json!({"name": "origin", "objectType": "equilibrium", "state": [0.0, 0.0]});
        let branch = json!({
            "name": "eq branch",
            "branchType": "eq",
            "parentObjectId": "eq-1",
            "startObjectId": "eq-1",
            "points": [[0.0, 0.0], [0.1, 0.2]],
        });
        system.index.objects.insert(
            "eq-1".into(),
            ObjectIndexEntry::derive("eq-1", &object, shard_for("eq-1"), system.updated_at),
        );
        system.index.branches.insert(
            "br-1".into(),
            BranchIndexEntry::derive("br-1", &branch, shard_for("br-1"), system.updated_at),
        );
        system.objects.insert("eq-1".into(), object);
        system.branches.insert("br-1".into(), branch);
        system
    }

    #[test]
    fn roundtrip_preserves_everything() {
        let system = sample_system();
        let bytes = write_archive(&system).unwrap();
        let back = read_archive(&bytes).unwrap();

        assert_eq!(back.id, system.id);
        assert_eq!(back.name, system.name);
        assert_eq!(back.config, system.config);
        assert_eq!(back.ui, system.ui);
        assert_eq!(back.index, system.index);
        // Payloads come back in normalized form: same content plus the id.
        assert_eq!(back.objects["eq-1"]["state"], json!([0.0, 0.0]));
        assert_eq!(back.objects["eq-1"]["id"], json!("eq-1"));
        assert_eq!(back.branches["br-1"]["parentObjectId"], json!("eq-1"));
        assert_eq!(back.branches["br-1"]["startObjectId"], json!("eq-1"));
    }

    #[test]
    fn payload_paths_follow_shards() {
        let system = sample_system();
        let bytes = write_archive(&system).unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let paths: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(paths.contains(&"manifest.json".to_string()));
        assert!(paths.contains(&format!("objects/{}/eq-1.json", shard_for("eq-1"))));
        assert!(paths.contains(&format!("branches/{}/br-1.json", shard_for("br-1"))));
    }

    #[test]
    fn export_requires_hydration() {
        let mut system = sample_system();
        system.objects.clear();
        let err = write_archive(&system).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingEntity { kind: "objects", .. }));
    }

    #[test]
    fn mismatched_manifest_version_rejected() {
        let system = sample_system();
        let mut bytes = write_archive(&system).unwrap();

        // Rebuild the container with a future manifest version.
        let manifest = encode_envelope(99, &Manifest::for_system(&system)).unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        let mut archive = tar::Archive::new(bytes.as_slice());
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut buf).unwrap();
            let data = if path == "manifest.json" { manifest.clone() } else { buf };
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data.as_slice()).unwrap();
        }
        bytes = builder.into_inner().unwrap();

        let err = read_archive(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::UnsupportedSchemaVersion { expected: 1, found: 99 }
        ));
    }

    #[test]
    fn missing_document_rejected() {
        let system = sample_system();
        let bytes = write_archive(&system).unwrap();

        // Drop ui.json from the container.
        let mut builder = tar::Builder::new(Vec::new());
        let mut archive = tar::Archive::new(bytes.as_slice());
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            if path == "ui.json" {
                continue;
            }
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut buf).unwrap();
            let mut header = tar::Header::new_gnu();
            header.set_size(buf.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, buf.as_slice()).unwrap();
        }
        let stripped = builder.into_inner().unwrap();

        let err = read_archive(&stripped).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingDocument("ui.json")));
    }

    #[test]
    fn empty_system_roundtrips() {
        let system = System::new("sys-0", "empty", Value::Null);
        let bytes = write_archive(&system).unwrap();
        let back = read_archive(&bytes).unwrap();
        assert_eq!(back, system);
    }

    #[test]
    fn filename_slugging() {
        let mut system = sample_system();
        assert_eq!(archive_filename(&system), "van-der-pol.fork-system.tar");
        system.name = "  ".into();
        assert_eq!(archive_filename(&system), "sys-1.fork-system.tar");
    }

    #[test]
    fn roundtrip_updated_at() {
        let mut system = sample_system();
        system.updated_at = Utc::now();
        let back = read_archive(&write_archive(&system).unwrap()).unwrap();
        assert_eq!(back.updated_at, system.updated_at);
    }
}
