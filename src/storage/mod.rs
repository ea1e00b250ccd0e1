//! Save path: change sets to bulk writes against a document store
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use docmapper::ast::ClrType;
//! use docmapper::metadata::{ConventionSet, EntityType, ModelBuilder, Property};
//! use docmapper::storage::{DocumentDatabase, MemoryDocumentStore};
//! use docmapper::update::{ChangeSet, EntityState};
//! use serde_json::json;
//!
//! let schema = Arc::new(
//!     ModelBuilder::new()
//!         .with_entity_type(
//!             EntityType::new("Family")
//!                 .with_property(Property::new("Id", ClrType::ObjectId))
//!                 .with_property(Property::new("LastName", ClrType::String)),
//!         )
//!         .finalize(&ConventionSet::default())
//!         .unwrap(),
//! );
//!
//! let mut changes = ChangeSet::new();
//! let values = json!({ "LastName": "Andersen" }).as_object().cloned().unwrap();
//! changes.track(schema.entity_type("Family").unwrap().clone(), EntityState::Added, values);
//!
//! let database = DocumentDatabase::new(schema, MemoryDocumentStore::new());
//! assert_eq!(database.save_changes(&mut changes).unwrap(), 1);
//! assert_eq!(database.store().count("families"), 1);
//! ```

pub mod database;
pub mod error;
pub mod memory;
pub mod store;

pub use database::{DatabaseOptions, DocumentDatabase};
pub use error::{SaveError, SaveResult, StoreError, StoreResult};
pub use memory::MemoryDocumentStore;
pub use store::{BulkWriteResult, DocumentStore};
