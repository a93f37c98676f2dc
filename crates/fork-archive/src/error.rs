use fork_model::ModelError;
use thiserror::Error;

/// Errors from archive export and import.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container lacks one of its required documents.
    #[error("archive is missing required document: {0}")]
    MissingDocument(&'static str),

    /// Export was attempted on a system missing an indexed payload.
    #[error("system is not fully hydrated: missing {kind} payload {id}")]
    MissingEntity { kind: &'static str, id: String },

    /// An envelope in the container carries an unsupported schema version.
    #[error("unsupported schema version: expected {expected}, found {found}")]
    UnsupportedSchemaVersion { expected: u32, found: u32 },

    /// An entry path or payload does not fit the container layout.
    #[error("malformed archive entry: {0}")]
    MalformedEntry(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the tar codec.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ModelError> for ArchiveError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnsupportedSchemaVersion { expected, found } => {
                Self::UnsupportedSchemaVersion { expected, found }
            }
            ModelError::Serialization(e) => Self::Serialization(e.to_string()),
        }
    }
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
