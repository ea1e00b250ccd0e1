//! Translation of entity queries into document queries
//!
//! Host expression trees ([`crate::ast::Expression`]) are lowered by the
//! [`SqlTranslator`] into a small IR of [`SqlExpression`] nodes bound to a
//! [`SelectStatement`]. The [`QueryableTranslator`] applies query operators
//! (filter, order, paging) and the [`QueryPlanGenerator`] renders the finished
//! statement into a [`FindPlan`] for the store.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use docmapper::ast::{ClrType, Expression, ParameterExpression};
//! use docmapper::metadata::{ConventionSet, EntityType, ModelBuilder, Property};
//! use docmapper::query::{QueryPlanGenerator, QueryableTranslator, SqlTranslator};
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
//! let f = ParameterExpression { name: "f".into(), clr_type: ClrType::entity("Family") };
//! let predicate = Expression::lambda(
//!     vec![f.clone()],
//!     Expression::equal(
//!         Expression::member(Expression::Parameter(f), "LastName", ClrType::String),
//!         Expression::constant("Andersen", ClrType::String),
//!     ),
//! );
//!
//! let queryable = QueryableTranslator::new(SqlTranslator::new(schema.clone()));
//! let query = queryable.create("Family").unwrap();
//! let query = queryable.single_or_default(query, Some(&predicate)).unwrap();
//!
//! let parameters = HashMap::new();
//! let plan = QueryPlanGenerator::new(&schema, &parameters)
//!     .generate(&query.into_select())
//!     .unwrap();
//! assert_eq!(plan.collection, "families");
//! assert_eq!(plan.limit, Some(2));
//! ```

pub mod entity_projection;
pub mod error;
pub mod expression;
pub mod factory;
pub mod generator;
pub mod method_translators;
pub mod queryable;
pub mod select;
pub mod translator;
pub mod type_mapping;

pub use entity_projection::{EntityProjection, ObjectArrayProjection};
pub use error::{QueryError, QueryResult};
pub use expression::{
    AccessExpression, InExpression, KeyAccess, ObjectAccess, Ordering, Projection,
    ProjectionMember, QueryExpression, RootReference, SqlBinaryExpression,
    SqlConditionalExpression, SqlConstantExpression, SqlExpression, SqlFunctionExpression,
    SqlParameterExpression, SqlUnaryExpression, SqlUnaryOp,
};
pub use factory::{verify_type_mappings, SqlExpressionFactory};
pub use generator::{FindPlan, QueryPlanGenerator, SortKey};
pub use method_translators::{
    ContainsTranslator, EqualsTranslator, MemberTranslator, MemberTranslatorPlugin,
    MemberTranslatorProvider, MethodCallTranslator, MethodCallTranslatorPlugin,
    MethodCallTranslatorProvider,
};
pub use queryable::{QueryableTranslator, ShapedQuery};
pub use select::{SelectStatement, ROOT_ALIAS};
pub use translator::SqlTranslator;
pub use type_mapping::{TypeMapping, TypeMappingSource};
