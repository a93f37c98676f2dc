use fork_model::ModelError;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A system or document was absent on an explicit load.
    ///
    /// Missing *index* documents are not errors — a project being saved for
    /// the first time has none, and they decode as empty indices.
    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted envelope carries a schema version the running code does
    /// not understand.
    #[error("unsupported schema version: expected {expected}, found {found}")]
    UnsupportedSchemaVersion { expected: u32, found: u32 },

    /// The requested backend cannot be opened in this environment. The
    /// caller (backend selection lives upstream) may retry with another.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The underlying storage engine failed for reasons outside this
    /// layer's control (aborted transaction, quota, corrupt database).
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// I/O error from the filesystem backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Archive export/import failure.
    #[error(transparent)]
    Archive(#[from] fork_archive::ArchiveError),
}

impl From<ModelError> for StoreError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnsupportedSchemaVersion { expected, found } => {
                Self::UnsupportedSchemaVersion { expected, found }
            }
            ModelError::Serialization(e) => Self::Serialization(e.to_string()),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
