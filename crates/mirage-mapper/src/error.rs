//! Mapper error types.

use mirage_core::{EntityId, ModelKind};
use thiserror::Error;

/// Result type alias for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

/// Errors that can occur during mapper operations.
///
/// Store errors pass through unchanged; the mapper layer only adds kind
/// checking and per-kind validation on top.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The row's model tag does not belong to this mapper: the id was
    /// minted under another kind. Surfaced, never auto-corrected.
    #[error("entity {id} is a {actual}, expected {expected}")]
    TypeMismatch {
        id: EntityId,
        expected: ModelKind,
        actual: ModelKind,
    },

    /// Required kind-specific fields are missing or invalid. Nothing was
    /// persisted.
    #[error("validation failed, offending fields: {fields:?}")]
    Validation { fields: Vec<&'static str> },

    #[error(transparent)]
    Decode(#[from] mirage_core::props::DecodeError),

    #[error("store error: {0}")]
    Store(#[from] mirage_state::StoreError),
}
