//! Error types for the Mirage resource store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Nothing here is retried internally and nothing is fatal to the process;
/// every failure is scoped to the single operation that raised it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or referential-integrity rule was violated.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The operation is refused while other rows still depend on the target.
    #[error("conflict: {0}")]
    Conflict(String),
}
