//! Error types for saving changes

use thiserror::Error;

use crate::metadata::SchemaError;
use crate::update::UpdateError;

/// Failures reported by a document store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Bulk write to collection '{collection}' failed: {message}")]
    BulkWrite { collection: String, message: String },

    #[error("The bulk write was cancelled")]
    Cancelled,

    #[error("Document store error: {0}")]
    Other(String),
}

/// Errors raised by a save
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error("Encountered orphaned document of type {0}.")]
    OrphanedEntity(String),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for saves
pub type SaveResult<T> = Result<T, SaveError>;
