//! Error types for schema finalization and metadata lookups

use thiserror::Error;

/// Errors raised while finalizing or querying a document schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Entity type '{entity_type}' derives from unknown base type '{base_type}'")]
    UnknownBaseType {
        entity_type: String,
        base_type: String,
    },

    #[error("Entity type '{entity_type}' is its own base type through its inheritance chain")]
    CyclicBaseType { entity_type: String },

    #[error("Navigation '{entity_type}.{navigation}' targets unknown entity type '{target}'")]
    UnknownNavigationTarget {
        entity_type: String,
        navigation: String,
        target: String,
    },

    #[error("Key property '{property}' is not defined on entity type '{entity_type}'")]
    UnknownKeyProperty {
        entity_type: String,
        property: String,
    },

    #[error("Duplicate collection name \"{collection}\" defined on entity type \"{entity_type}\".")]
    DuplicateCollectionName {
        collection: String,
        entity_type: String,
    },

    #[error("Missing discriminator value for entity type {0}.")]
    MissingDiscriminator(String),

    #[error(
        "Duplicate discriminator value {discriminator} for root entity type {root_type} (defined on {entity_type})."
    )]
    DuplicateDiscriminator {
        discriminator: String,
        entity_type: String,
        root_type: String,
    },

    #[error("Property '{entity_type}.{property}' of type '{clr_type}' has no document type mapping")]
    PropertyNotMapped {
        entity_type: String,
        property: String,
        clr_type: String,
    },

    #[error("Owned entity type '{0}' is not the target of any owning navigation")]
    OwnedTypeWithoutOwner(String),

    #[error("Owned entity type '{entity_type}' is owned by both '{first}' and '{second}'")]
    MultipleOwners {
        entity_type: String,
        first: String,
        second: String,
    },

    #[error("Navigation '{entity_type}.{navigation}' references owned entity type '{owned_type}' without owning it")]
    InverseToOwnedType {
        entity_type: String,
        navigation: String,
        owned_type: String,
    },

    #[error("Entity type '{0}' is embedded and is not bound to a collection")]
    NotACollectionType(String),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
