//! Entity metadata for document mapping
//!
//! The metadata layer describes which entity types exist, how they nest
//! inside one another, and which physical collection each root document
//! lives in. Raw types are collected in a [`ModelBuilder`] and turned into an
//! immutable [`DocumentSchema`] by running an explicit [`ConventionSet`].
//!
//! # Example
//!
//! ```rust
//! use docmapper::ast::ClrType;
//! use docmapper::metadata::{ConventionSet, EntityType, ModelBuilder, Navigation, Property};
//!
//! let schema = ModelBuilder::new()
//!     .with_entity_type(
//!         EntityType::new("Family")
//!             .with_property(Property::new("Id", ClrType::ObjectId))
//!             .with_property(Property::new("LastName", ClrType::String))
//!             .with_navigation(Navigation::reference("Address", "Address").owned()),
//!     )
//!     .with_entity_type(
//!         EntityType::new("Address").with_property(Property::new("City", ClrType::String)),
//!     )
//!     .finalize(&ConventionSet::default())
//!     .unwrap();
//!
//! let family = schema.entity_type("Family").unwrap();
//! assert_eq!(schema.collection_name(family).unwrap(), "families");
//! ```

pub mod conventions;
pub mod error;
pub mod model;
pub mod validation;

pub use conventions::{
    pluralize, to_lower_camel_case, CollectionNameConvention, CollectionNaming, ConventionSet,
    DiscriminatorConvention, ElementNameConvention, KeyDiscoveryConvention, ModelConvention,
    OwnedDocumentConvention, OwnershipConvention, ValueGenerationConvention, KEY_ELEMENT,
};
pub use error::{SchemaError, SchemaResult};
pub use model::{
    DocumentSchema, EntityType, ModelBuilder, Navigation, Ownership, Property, ValueGenerated,
    DEFAULT_DISCRIMINATOR_ELEMENT,
};
pub use validation::ModelValidator;
