//! Error types for the write path

use thiserror::Error;

use crate::metadata::SchemaError;

use super::entry::{EntityState, EntryId};

/// Errors raised while building write models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpdateError {
    #[error("The value provided for entityState must be Added, Modified, Unchanged, or Deleted, but was {0}.")]
    InvalidEntityState(EntityState),

    #[error("Entity type '{0}' has no primary key and cannot be matched in its collection")]
    MissingPrimaryKey(String),

    #[error("Entity of type '{entity_type}' has no value for key property '{property}'")]
    MissingKeyValue {
        entity_type: String,
        property: String,
    },

    #[error("No value generator is available for '{entity_type}.{property}' of type '{clr_type}'")]
    NoValueGenerator {
        entity_type: String,
        property: String,
        clr_type: String,
    },

    #[error("Entry {0} is not tracked by this change set")]
    UnknownEntry(EntryId),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type for write-path operations
pub type UpdateResult<T> = Result<T, UpdateError>;
