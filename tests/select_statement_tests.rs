//! Projection and paging behaviour of SelectStatement

use std::collections::HashSet;

use docmapper::ast::ClrType;
use docmapper::metadata::{ConventionSet, DocumentSchema, EntityType, ModelBuilder, Property};
use docmapper::query::{Ordering, QueryError, SelectStatement, SqlExpressionFactory, ROOT_ALIAS};
use proptest::prelude::*;

fn create_test_schema() -> DocumentSchema {
    ModelBuilder::new()
        .with_entity_type(
            EntityType::new("Family")
                .with_property(Property::new("Id", ClrType::ObjectId))
                .with_property(Property::new("LastName", ClrType::String)),
        )
        .finalize(&ConventionSet::default())
        .unwrap()
}

fn create_select(schema: &DocumentSchema) -> SelectStatement {
    SelectStatement::new(schema, schema.entity_type("Family").unwrap()).unwrap()
}

fn arb_alias() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("value".to_string())),
        Just(Some("VALUE".to_string())),
        Just(Some("c".to_string())),
        "[a-bA-B][0-2]?".prop_map(Some),
    ]
}

// =============================================================================
// Aliases
// =============================================================================

proptest! {
    #[test]
    fn aliases_are_unique_ignoring_case(aliases in prop::collection::vec(arb_alias(), 1..24)) {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();

        for (i, alias) in aliases.iter().enumerate() {
            let index = select.add_to_projection_with_alias(
                f.constant(i as i64, ClrType::Int64),
                alias.as_deref(),
            );
            prop_assert_eq!(index, i);
        }

        let mut seen = HashSet::new();
        for projection in select.projection() {
            prop_assert!(!projection.alias.eq_ignore_ascii_case("value"));
            prop_assert!(seen.insert(projection.alias.to_lowercase()));
        }
    }

    #[test]
    fn repeated_expressions_are_deduplicated(values in prop::collection::vec(0i64..5, 1..32)) {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();

        for value in &values {
            let first = select.add_to_projection(f.constant(*value, ClrType::Int64));
            let again = select.add_to_projection(f.constant(*value, ClrType::Int64));
            prop_assert_eq!(first, again);
        }

        let distinct: HashSet<i64> = values.iter().copied().collect();
        prop_assert_eq!(select.projection().len(), distinct.len());
    }
}

// =============================================================================
// Root projection
// =============================================================================

#[test]
fn test_root_projection_uses_root_alias() {
    let schema = create_test_schema();
    let mut select = create_select(&schema);
    select.apply_projection();
    assert_eq!(select.projection().len(), 1);
    assert_eq!(select.projection()[0].alias, ROOT_ALIAS);
}

// =============================================================================
// Paging
// =============================================================================

#[test]
fn test_ordering_after_limit_fails() {
    let schema = create_test_schema();
    let mut select = create_select(&schema);
    let f = SqlExpressionFactory::default();

    select.apply_limit(f.constant(5, ClrType::Int32)).unwrap();
    let ordering = Ordering::new(f.constant(1, ClrType::Int32), true);
    assert_eq!(select.apply_ordering(ordering), Err(QueryError::OrderingAfterPaging));
}

#[test]
fn test_offset_after_limit_is_allowed() {
    let schema = create_test_schema();
    let mut select = create_select(&schema);
    let f = SqlExpressionFactory::default();

    select.apply_limit(f.constant(5, ClrType::Int32)).unwrap();
    select.apply_offset(f.constant(10, ClrType::Int32)).unwrap();
    assert!(select.limit().is_some());
    assert!(select.offset().is_some());
}
