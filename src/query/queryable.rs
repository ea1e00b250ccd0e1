//! Query-shape operators over a select statement
//!
//! Each operator takes a [`ShapedQuery`], translates its lambda through the
//! [`SqlTranslator`] and applies the result to the select statement. An
//! operand that cannot be translated fails the operator with
//! [`QueryError::Untranslatable`].

use crate::ast::{ClrType, Expression, LambdaExpression};

use super::error::{QueryError, QueryResult};
use super::expression::{Ordering, ProjectionMember, SqlExpression};
use super::select::SelectStatement;
use super::translator::SqlTranslator;

/// A select statement plus the expression that shapes each result
#[derive(Debug, Clone)]
pub struct ShapedQuery {
    pub select: SelectStatement,
    pub shaper: Expression,
}

impl ShapedQuery {
    /// Flatten the projection and hand out the finished statement
    pub fn into_select(mut self) -> SelectStatement {
        self.select.apply_projection();
        self.select
    }
}

/// Applies query operators to shaped queries
#[derive(Debug, Clone)]
pub struct QueryableTranslator {
    translator: SqlTranslator,
}

impl QueryableTranslator {
    pub fn new(translator: SqlTranslator) -> Self {
        Self { translator }
    }

    pub fn translator(&self) -> &SqlTranslator {
        &self.translator
    }

    /// Query over every document of an entity type
    pub fn create(&self, entity_type: &str) -> QueryResult<ShapedQuery> {
        let entity_type = self.translator.schema().entity_type(entity_type)?.clone();
        let select = SelectStatement::new(self.translator.schema(), &entity_type)?;
        let shaper = Expression::entity_shaper(
            entity_type.name.clone(),
            Expression::projection_binding(ProjectionMember::root(), entity_type.clr_type()),
        );
        Ok(ShapedQuery { select, shaper })
    }

    pub fn where_(
        &self,
        mut source: ShapedQuery,
        predicate: &Expression,
    ) -> QueryResult<ShapedQuery> {
        let predicate = self.translate_lambda(&source, predicate)?;
        source.select.apply_predicate(predicate);
        Ok(source)
    }

    pub fn order_by(
        &self,
        mut source: ShapedQuery,
        key_selector: &Expression,
        ascending: bool,
    ) -> QueryResult<ShapedQuery> {
        let key = self.translate_lambda(&source, key_selector)?;
        source.select.apply_ordering(Ordering::new(key, ascending))?;
        Ok(source)
    }

    pub fn then_by(
        &self,
        mut source: ShapedQuery,
        key_selector: &Expression,
        ascending: bool,
    ) -> QueryResult<ShapedQuery> {
        let key = self.translate_lambda(&source, key_selector)?;
        source.select.append_ordering(Ordering::new(key, ascending));
        Ok(source)
    }

    pub fn take(&self, mut source: ShapedQuery, count: &Expression) -> QueryResult<ShapedQuery> {
        let count = self.translate(&source, count)?;
        source.select.apply_limit(count)?;
        Ok(source)
    }

    pub fn skip(&self, mut source: ShapedQuery, count: &Expression) -> QueryResult<ShapedQuery> {
        let count = self.translate(&source, count)?;
        source.select.apply_offset(count)?;
        Ok(source)
    }

    pub fn distinct(&self, mut source: ShapedQuery) -> ShapedQuery {
        source.select.apply_distinct();
        source
    }

    pub fn reverse(&self, mut source: ShapedQuery) -> QueryResult<ShapedQuery> {
        source.select.reverse_orderings()?;
        Ok(source)
    }

    /// At most one result, optionally filtered first
    pub fn first_or_default(
        &self,
        source: ShapedQuery,
        predicate: Option<&Expression>,
    ) -> QueryResult<ShapedQuery> {
        self.limit_results(source, predicate, 1)
    }

    /// Fetch up to two results so the caller can detect a second match
    pub fn single_or_default(
        &self,
        source: ShapedQuery,
        predicate: Option<&Expression>,
    ) -> QueryResult<ShapedQuery> {
        self.limit_results(source, predicate, 2)
    }

    fn limit_results(
        &self,
        source: ShapedQuery,
        predicate: Option<&Expression>,
        limit: i32,
    ) -> QueryResult<ShapedQuery> {
        let mut source = match predicate {
            Some(predicate) => self.where_(source, predicate)?,
            None => source,
        };
        let limit = self.translate(&source, &Expression::constant(limit, ClrType::Int32))?;
        source.select.apply_limit(limit)?;
        Ok(source)
    }

    fn translate(
        &self,
        source: &ShapedQuery,
        expression: &Expression,
    ) -> QueryResult<SqlExpression> {
        self.translator
            .translate(&source.select, expression)?
            .ok_or_else(|| QueryError::Untranslatable(expression.to_string()))
    }

    /// Bind a one-parameter lambda's parameter to the query's shaper and
    /// translate its body
    fn translate_lambda(
        &self,
        source: &ShapedQuery,
        lambda: &Expression,
    ) -> QueryResult<SqlExpression> {
        let Expression::Lambda(LambdaExpression { parameters, body }) = lambda else {
            return Err(QueryError::Untranslatable(lambda.to_string()));
        };
        let [parameter] = parameters.as_slice() else {
            return Err(QueryError::Untranslatable(lambda.to_string()));
        };

        let body = body.replace_parameter(&parameter.name, &source.shaper);
        self.translator
            .translate(&source.select, &body)?
            .ok_or_else(|| QueryError::Untranslatable(lambda.to_string()))
    }
}
