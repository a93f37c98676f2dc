use thiserror::Error;

/// Errors from model-level encoding and decoding.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A persisted envelope carries a schema version the running code does
    /// not understand. No forward or partial decoding is attempted.
    #[error("unsupported schema version: expected {expected}, found {found}")]
    UnsupportedSchemaVersion { expected: u32, found: u32 },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
