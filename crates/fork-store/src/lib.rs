//! Sharded, differential project store for fork analysis projects.
//!
//! A project (a [`System`]) is persisted as a set of small, independently
//! writable documents — manifest, metadata, UI snapshot, and two entity
//! indices — plus one payload document per analysis object and continuation
//! branch, bucketed by a deterministic shard of the entity id. Loading
//! returns a cheap *skeleton*; payloads hydrate lazily on request.
//!
//! Saving is differential: [`SystemStore::save`] reconciles the indices,
//! compares canonical serializations against what is persisted, and writes
//! only the payloads that are new or changed before deleting only the ones
//! that were removed. Routine UI churn goes through
//! [`SystemStore::save_ui`], which rewrites two small documents and nothing
//! else.
//!
//! # Backends
//!
//! All backends implement the [`StorageBackend`] trait and are driven by the
//! same [`SystemStore`] logic:
//!
//! - [`FsBackend`] — one directory per project under a root directory
//! - [`RedbBackend`] — a transactional key-value database with separate
//!   data and UI tables
//! - [`MemoryBackend`] — instrumented in-memory backend for tests and
//!   deterministic mode
//!
//! [`System`]: fork_model::System

pub mod error;
pub mod fs;
pub mod kv;
pub mod memory;
pub mod reconcile;
pub mod store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBackend;
pub use kv::{RedbBackend, DB_FILE_NAME, KV_STORE_VERSION};
pub use memory::MemoryBackend;
pub use reconcile::{reconcile_branches, reconcile_index, reconcile_objects};
pub use store::{HydratedEntities, SystemArchive, SystemStore};
pub use traits::{DocKind, EntityKind, StorageBackend};
