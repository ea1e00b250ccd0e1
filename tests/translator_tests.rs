//! Translation tests driven through the public query API:
//! 1. Build a schema and a root select
//! 2. Lower host expressions with the SqlTranslator
//! 3. Compare against equivalent hand-written forms

use std::sync::Arc;

use docmapper::ast::{BinaryOp, ClrType, Expression, MethodInfo};
use docmapper::metadata::{ConventionSet, DocumentSchema, EntityType, ModelBuilder, Property};
use docmapper::query::{ProjectionMember, SelectStatement, SqlExpression, SqlTranslator};

fn create_test_schema() -> Arc<DocumentSchema> {
    Arc::new(
        ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Family")
                    .with_property(Property::new("Id", ClrType::ObjectId))
                    .with_property(Property::new("LastName", ClrType::String))
                    .with_property(Property::new("Nickname", ClrType::String))
                    .with_property(Property::new("Rank", ClrType::Int16)),
            )
            .finalize(&ConventionSet::default())
            .unwrap(),
    )
}

fn setup() -> (SqlTranslator, SelectStatement) {
    let schema = create_test_schema();
    let select = SelectStatement::new(&schema, schema.entity_type("Family").unwrap()).unwrap();
    (SqlTranslator::new(schema), select)
}

fn family() -> Expression {
    Expression::entity_shaper(
        "Family",
        Expression::projection_binding(ProjectionMember::root(), ClrType::entity("Family")),
    )
}

fn last_name() -> Expression {
    Expression::member(family(), "LastName", ClrType::String)
}

// =============================================================================
// Coalesce
// =============================================================================

#[test]
fn test_coalesce_matches_conditional() {
    let (translator, select) = setup();
    let nickname = Expression::member(family(), "Nickname", ClrType::String);

    let coalesce = Expression::binary(BinaryOp::Coalesce, nickname.clone(), last_name());
    let conditional = Expression::condition(
        Expression::not_equal(nickname.clone(), Expression::null(ClrType::String)),
        nickname,
        last_name(),
    );

    let from_coalesce = translator.translate(&select, &coalesce).unwrap();
    let from_conditional = translator.translate(&select, &conditional).unwrap();
    assert!(from_coalesce.is_some());
    assert_eq!(from_coalesce, from_conditional);
}

// =============================================================================
// Equals
// =============================================================================

#[test]
fn test_equals_with_mismatched_types_is_false() {
    let (translator, select) = setup();
    let call = Expression::call(
        last_name(),
        MethodInfo::instance_equals(ClrType::String),
        vec![Expression::convert(
            Expression::constant(5, ClrType::Int32),
            ClrType::Object,
        )],
    );

    let f = translator.factory();
    let expected = f.apply_default_type_mapping(f.constant(false, ClrType::Bool));
    assert_eq!(translator.translate(&select, &call).unwrap(), expected);
}

#[test]
fn test_static_equals_matches_equality() {
    let (translator, select) = setup();
    let call = Expression::static_call(
        MethodInfo::static_equals(),
        vec![
            Expression::convert(last_name(), ClrType::Object),
            Expression::convert(
                Expression::constant("Andersen", ClrType::String),
                ClrType::Object,
            ),
        ],
    );
    let equality = Expression::equal(
        last_name(),
        Expression::constant("Andersen", ClrType::String),
    );

    let from_call = translator.translate(&select, &call).unwrap();
    assert!(from_call.is_some());
    assert_eq!(from_call, translator.translate(&select, &equality).unwrap());
}

// =============================================================================
// Contains
// =============================================================================

#[test]
fn test_contains_forms_translate_identically() {
    let (translator, select) = setup();
    let names = Expression::parameter("names", ClrType::list(ClrType::String));

    let from_enumerable = Expression::static_call(
        MethodInfo::enumerable_contains(),
        vec![names.clone(), last_name()],
    );
    let from_list = Expression::call(
        names,
        MethodInfo::collection_contains(ClrType::list(ClrType::String)),
        vec![last_name()],
    );

    let left = translator.translate(&select, &from_enumerable).unwrap();
    let right = translator.translate(&select, &from_list).unwrap();
    assert_eq!(left, right);
    assert!(matches!(left, Some(SqlExpression::In(_))));
}

// =============================================================================
// Untranslatable input
// =============================================================================

#[test]
fn test_unknown_method_is_untranslatable() {
    let (translator, select) = setup();
    let call = Expression::call(
        last_name(),
        MethodInfo::instance(ClrType::String, "Soundex", ClrType::String),
        vec![],
    );
    assert_eq!(translator.translate(&select, &call).unwrap(), None);
}

#[test]
fn test_narrowing_convert_is_untranslatable() {
    let (translator, select) = setup();
    let narrowed = Expression::convert(last_name(), ClrType::Int32);
    assert_eq!(translator.translate(&select, &narrowed).unwrap(), None);
}
