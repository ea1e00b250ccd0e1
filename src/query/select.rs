//! Select statement builder
//!
//! A [`SelectStatement`] starts with a projection mapping from
//! [`ProjectionMember`]s to IR nodes. [`SelectStatement::apply_projection`]
//! flattens that mapping into an ordered projection list with unique aliases,
//! after which the mapping values are integer indices into the list.
//!
//! Paging and ordering are guarded: applying a limit or offset twice, or
//! replacing orderings after paging, is reported as a [`QueryError`] because
//! it means the caller emitted operators in an invalid order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::{BinaryOp, ClrType};
use crate::metadata::{DocumentSchema, EntityType};

use super::entity_projection::EntityProjection;
use super::error::{QueryError, QueryResult};
use super::expression::{
    Ordering, Projection, ProjectionMember, QueryExpression, RootReference, SqlBinaryExpression,
    SqlConstantExpression, SqlExpression,
};
use super::type_mapping::TypeMapping;

/// Alias of the queried document
pub const ROOT_ALIAS: &str = "c";

/// Alias never handed out as-is
const RESERVED_ALIAS: &str = "value";

/// Aliases compare case-insensitively across the whole of Unicode
fn alias_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// A read query against one collection
#[derive(Debug, Clone)]
pub struct SelectStatement {
    collection: String,
    from: RootReference,
    projection_mapping: BTreeMap<ProjectionMember, QueryExpression>,
    projection: Vec<Projection>,
    projection_applied: bool,
    predicate: Option<SqlExpression>,
    orderings: Vec<Ordering>,
    limit: Option<SqlExpression>,
    offset: Option<SqlExpression>,
    is_distinct: bool,
}

impl SelectStatement {
    /// Select every document of `entity_type` from its collection
    pub fn new(schema: &DocumentSchema, entity_type: &Arc<EntityType>) -> QueryResult<Self> {
        let collection = schema.collection_name(entity_type)?;
        let from = RootReference::new(entity_type.clone(), ROOT_ALIAS);

        let mut projection_mapping = BTreeMap::new();
        projection_mapping.insert(
            ProjectionMember::root(),
            EntityProjection::root(entity_type.clone(), ROOT_ALIAS).into(),
        );

        Ok(Self {
            collection,
            from,
            projection_mapping,
            projection: Vec::new(),
            projection_applied: false,
            predicate: None,
            orderings: Vec::new(),
            limit: None,
            offset: None,
            is_distinct: false,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn from(&self) -> &RootReference {
        &self.from
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.from.entity_type
    }

    pub fn projection(&self) -> &[Projection] {
        &self.projection
    }

    pub fn projection_mapping(&self) -> &BTreeMap<ProjectionMember, QueryExpression> {
        &self.projection_mapping
    }

    pub fn is_projection_applied(&self) -> bool {
        self.projection_applied
    }

    pub fn predicate(&self) -> Option<&SqlExpression> {
        self.predicate.as_ref()
    }

    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    pub fn limit(&self) -> Option<&SqlExpression> {
        self.limit.as_ref()
    }

    pub fn offset(&self) -> Option<&SqlExpression> {
        self.offset.as_ref()
    }

    pub fn is_distinct(&self) -> bool {
        self.is_distinct
    }

    /// Expression registered for a projection member
    pub fn get_mapped_projection(
        &self,
        member: &ProjectionMember,
    ) -> QueryResult<&QueryExpression> {
        self.projection_mapping
            .get(member)
            .ok_or_else(|| QueryError::ProjectionNotFound(member.to_string()))
    }

    pub fn replace_projection_mapping(
        &mut self,
        mapping: impl IntoIterator<Item = (ProjectionMember, QueryExpression)>,
    ) {
        self.projection_mapping = mapping.into_iter().collect();
    }

    /// Flatten the projection mapping into the projection list; later calls
    /// do nothing
    pub fn apply_projection(&mut self) {
        if self.projection_applied {
            return;
        }

        let mapping = std::mem::take(&mut self.projection_mapping);
        for (member, expression) in mapping {
            let alias = member.last().map(str::to_string);
            let index = self.add_to_projection_with_alias(expression, alias.as_deref());
            self.projection_mapping
                .insert(member, index_constant(index).into());
        }
        self.projection_applied = true;
    }

    /// Add an output field, returning its index
    pub fn add_to_projection(&mut self, expression: impl Into<QueryExpression>) -> usize {
        self.add_to_projection_with_alias(expression, None)
    }

    /// Add an output field under a preferred alias, returning its index.
    ///
    /// A structurally equal field already present is reused. Aliases are
    /// unique ignoring case and never equal `value`; collisions get a
    /// numeric suffix.
    pub fn add_to_projection_with_alias(
        &mut self,
        expression: impl Into<QueryExpression>,
        alias: Option<&str>,
    ) -> usize {
        let expression = expression.into();
        if let Some(existing) = self.projection.iter().position(|p| p.expression == expression) {
            return existing;
        }

        let base_alias = alias
            .or_else(|| expression.name().filter(|name| !name.is_empty()))
            .unwrap_or(ROOT_ALIAS)
            .to_string();
        let mut alias = base_alias.clone();
        let mut counter = 0;
        while alias_eq(&alias, RESERVED_ALIAS)
            || self.projection.iter().any(|p| alias_eq(&p.alias, &alias))
        {
            alias = format!("{}{}", base_alias, counter);
            counter += 1;
        }

        self.projection.push(Projection { expression, alias });
        self.projection.len() - 1
    }

    pub fn apply_distinct(&mut self) {
        self.is_distinct = true;
    }

    /// AND a predicate into the filter; a literal `true` is ignored
    pub fn apply_predicate(&mut self, expression: SqlExpression) {
        if expression.is_true_constant() {
            return;
        }

        self.predicate = Some(match self.predicate.take() {
            None => expression,
            Some(existing) => {
                let type_mapping = expression.type_mapping().cloned();
                SqlExpression::Binary(Box::new(SqlBinaryExpression {
                    op: BinaryOp::AndAlso,
                    left: existing,
                    right: expression,
                    clr_type: ClrType::Bool,
                    type_mapping,
                }))
            }
        });
    }

    pub fn apply_limit(&mut self, expression: SqlExpression) -> QueryResult<()> {
        if self.limit.is_some() {
            return Err(QueryError::LimitAlreadyApplied);
        }
        self.limit = Some(expression);
        Ok(())
    }

    pub fn apply_offset(&mut self, expression: SqlExpression) -> QueryResult<()> {
        if self.offset.is_some() {
            return Err(QueryError::OffsetAlreadyApplied);
        }
        self.offset = Some(expression);
        Ok(())
    }

    /// Replace all orderings with one; only valid before distinct or paging
    pub fn apply_ordering(&mut self, ordering: Ordering) -> QueryResult<()> {
        if self.is_distinct || self.limit.is_some() || self.offset.is_some() {
            return Err(QueryError::OrderingAfterPaging);
        }
        self.orderings.clear();
        self.orderings.push(ordering);
        Ok(())
    }

    /// Add an ordering unless its expression is already ordered on
    pub fn append_ordering(&mut self, ordering: Ordering) {
        if !self
            .orderings
            .iter()
            .any(|o| o.expression == ordering.expression)
        {
            self.orderings.push(ordering);
        }
    }

    pub fn clear_ordering(&mut self) {
        self.orderings.clear();
    }

    /// Flip every ordering's direction
    pub fn reverse_orderings(&mut self) -> QueryResult<()> {
        if self.limit.is_some() || self.offset.is_some() {
            return Err(QueryError::ReverseAfterPaging);
        }
        self.orderings = self.orderings.iter().map(Ordering::reversed).collect();
        Ok(())
    }
}

fn index_constant(index: usize) -> SqlExpression {
    SqlExpression::Constant(SqlConstantExpression {
        value: index.into(),
        clr_type: ClrType::Int32,
        type_mapping: Some(TypeMapping::new(ClrType::Int32)),
    })
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.is_distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.projection.is_empty() {
            write!(f, "{}", self.from.alias)?;
        }
        for (i, projection) in self.projection.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", projection)?;
        }
        write!(f, " FROM {} {}", self.collection, self.from.alias)?;
        if let Some(predicate) = &self.predicate {
            write!(f, " WHERE {}", predicate)?;
        }
        if !self.orderings.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, ordering) in self.orderings.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", ordering)?;
            }
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ConventionSet, ModelBuilder, Property};
    use crate::query::SqlExpressionFactory;

    fn create_test_schema() -> DocumentSchema {
        ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Family")
                    .with_property(Property::new("Id", ClrType::ObjectId))
                    .with_property(Property::new("LastName", ClrType::String))
                    .with_property(Property::new("Value", ClrType::Int32)),
            )
            .finalize(&ConventionSet::default())
            .unwrap()
    }

    fn create_select(schema: &DocumentSchema) -> SelectStatement {
        SelectStatement::new(schema, schema.entity_type("Family").unwrap()).unwrap()
    }

    fn bool_constant(value: bool) -> SqlExpression {
        SqlExpressionFactory::default()
            .apply_default_type_mapping(
                SqlExpressionFactory::default().constant(value, ClrType::Bool),
            )
            .unwrap()
    }

    #[test]
    fn test_new_select() {
        let schema = create_test_schema();
        let select = create_select(&schema);
        assert_eq!(select.collection(), "families");
        assert_eq!(select.from().alias, ROOT_ALIAS);
        assert!(select.get_mapped_projection(&ProjectionMember::root()).is_ok());
        assert_eq!(select.to_string(), "SELECT c FROM families c");
    }

    #[test]
    fn test_apply_projection_is_idempotent() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);

        select.apply_projection();
        let projection = select.projection().to_vec();
        let mapping = select.projection_mapping().clone();
        select.apply_projection();

        assert_eq!(select.projection(), projection.as_slice());
        assert_eq!(select.projection_mapping(), &mapping);
        assert_eq!(projection.len(), 1);
        assert_eq!(projection[0].alias, "c");
        assert_eq!(
            select.get_mapped_projection(&ProjectionMember::root()).unwrap(),
            &QueryExpression::Sql(index_constant(0))
        );
    }

    #[test]
    fn test_missing_projection_member() {
        let schema = create_test_schema();
        let select = create_select(&schema);
        let err = select
            .get_mapped_projection(&ProjectionMember::from_path(&["Address"]))
            .unwrap_err();
        assert_eq!(err, QueryError::ProjectionNotFound("Address".to_string()));
    }

    #[test]
    fn test_reserved_alias_is_suffixed() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();

        select.add_to_projection_with_alias(f.constant(1, ClrType::Int32), Some("Value"));
        select.add_to_projection_with_alias(f.constant(2, ClrType::Int32), Some("value"));
        let aliases: Vec<&str> = select.projection().iter().map(|p| p.alias.as_str()).collect();
        assert_eq!(aliases, vec!["Value0", "value1"]);
    }

    #[test]
    fn test_non_ascii_aliases_collide() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();

        select.add_to_projection_with_alias(f.constant(1, ClrType::Int32), Some("Ärger"));
        select.add_to_projection_with_alias(f.constant(2, ClrType::Int32), Some("ärger"));
        let aliases: Vec<&str> = select.projection().iter().map(|p| p.alias.as_str()).collect();
        assert_eq!(aliases, vec!["Ärger", "ärger0"]);
    }

    #[test]
    fn test_projection_dedup() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();

        let first = select.add_to_projection(f.constant(1, ClrType::Int32));
        let second = select.add_to_projection(f.constant(1, ClrType::Int32));
        let third = select.add_to_projection(f.constant(2, ClrType::Int32));
        assert_eq!(first, second);
        assert_eq!(third, 1);
        let aliases: Vec<&str> = select.projection().iter().map(|p| p.alias.as_str()).collect();
        assert_eq!(aliases, vec!["c", "c0"]);
    }

    #[test]
    fn test_true_predicate_is_ignored() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        select.apply_predicate(bool_constant(true));
        assert!(select.predicate().is_none());

        select.apply_predicate(bool_constant(false));
        select.apply_predicate(bool_constant(false));
        let Some(SqlExpression::Binary(b)) = select.predicate() else {
            panic!("expected a conjunction");
        };
        assert_eq!(b.op, BinaryOp::AndAlso);
    }

    #[test]
    fn test_paging_once() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();

        select.apply_limit(f.constant(10, ClrType::Int32)).unwrap();
        assert_eq!(
            select.apply_limit(f.constant(5, ClrType::Int32)),
            Err(QueryError::LimitAlreadyApplied)
        );
        select.apply_offset(f.constant(10, ClrType::Int32)).unwrap();
        assert_eq!(
            select.apply_offset(f.constant(5, ClrType::Int32)),
            Err(QueryError::OffsetAlreadyApplied)
        );
    }

    #[test]
    fn test_ordering_rules() {
        let schema = create_test_schema();
        let mut select = create_select(&schema);
        let f = SqlExpressionFactory::default();
        let by_one = Ordering::new(f.constant(1, ClrType::Int32), true);
        let by_two = Ordering::new(f.constant(2, ClrType::Int32), true);

        select.apply_ordering(by_one.clone()).unwrap();
        select.apply_ordering(by_two.clone()).unwrap();
        assert_eq!(select.orderings(), &[by_two.clone()]);

        select.reverse_orderings().unwrap();
        assert!(!select.orderings()[0].ascending);

        select.apply_distinct();
        assert_eq!(
            select.apply_ordering(by_one.clone()),
            Err(QueryError::OrderingAfterPaging)
        );
        select.append_ordering(by_one.clone());
        select.append_ordering(by_one);
        assert_eq!(select.orderings().len(), 2);

        select.apply_limit(f.constant(1, ClrType::Int32)).unwrap();
        assert_eq!(select.reverse_orderings(), Err(QueryError::ReverseAfterPaging));
    }
}
