//! Write path: tracked entries to write directives
//!
//! A [`ChangeSet`] holds the tracked entities of one unit of work. For each
//! root document to save, the [`WriteModelFactorySelector`] picks a cached
//! [`WriteModelFactory`] by entity type and state, and the factory produces
//! one [`WriteModel`] with the document composed by the
//! [`DocumentSerializer`].

pub mod cache;
pub mod document;
pub mod entry;
pub mod error;
pub mod factory;
pub mod selector;
pub mod value_generation;
pub mod write_model;

pub use cache::WriteModelFactoryCache;
pub use document::DocumentSerializer;
pub use entry::{ChangeSet, Document, EntityState, EntryId, UpdateEntry};
pub use error::{UpdateError, UpdateResult};
pub use factory::{
    DeleteOneModelFactory, InsertOneModelFactory, ReplaceOneModelFactory, WriteModelFactory,
};
pub use selector::WriteModelFactorySelector;
pub use value_generation::{
    GuidValueGenerator, ObjectIdValueGenerator, SequentialValueGenerator, ValueGenerator,
    ValueGeneratorSelector,
};
pub use write_model::{WriteModel, WriteModelKind};
