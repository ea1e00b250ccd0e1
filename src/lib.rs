pub mod ast;
pub mod metadata;
pub mod query;
pub mod storage;
pub mod update;

pub use ast::{ClrType, Expression, MethodInfo};
pub use metadata::{ConventionSet, DocumentSchema, EntityType, ModelBuilder, SchemaError};
pub use query::{
    QueryError, QueryPlanGenerator, QueryableTranslator, SelectStatement, SqlTranslator,
};
pub use storage::{DocumentDatabase, DocumentStore, SaveError};
pub use update::{ChangeSet, EntityState, UpdateError, WriteModel};
