//! Translation of generic expression trees into the document query IR
//!
//! [`SqlTranslator::translate`] walks an [`Expression`] by exhaustive match.
//! Any node the document store cannot express makes the whole translation
//! yield `Ok(None)`; `Err` is reserved for configuration errors such as a
//! projection binding to an unregistered member.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{
    BinaryExpression, BinaryOp, ClrType, ConditionalExpression, Expression, MemberExpression,
    MethodCallExpression, NewExpression, UnaryExpression, UnaryOp,
};
use crate::metadata::DocumentSchema;

use super::error::QueryResult;
use super::expression::{QueryExpression, SqlExpression};
use super::factory::{verify_type_mappings, SqlExpressionFactory};
use super::method_translators::{
    MemberTranslatorPlugin, MemberTranslatorProvider, MethodCallTranslatorPlugin,
    MethodCallTranslatorProvider,
};
use super::select::SelectStatement;

/// Translates scalar and predicate expressions against a select statement
#[derive(Debug, Clone)]
pub struct SqlTranslator {
    schema: Arc<DocumentSchema>,
    factory: SqlExpressionFactory,
    method_translators: MethodCallTranslatorProvider,
    member_translators: MemberTranslatorProvider,
}

impl SqlTranslator {
    /// Translator with the built-in method translators only
    pub fn new(schema: Arc<DocumentSchema>) -> Self {
        let factory = SqlExpressionFactory::default();
        Self {
            schema,
            factory,
            method_translators: MethodCallTranslatorProvider::new(factory, &[]),
            member_translators: MemberTranslatorProvider::default(),
        }
    }

    /// Register method-call translator plugins, tried before the built-ins
    pub fn with_method_plugins(mut self, plugins: &[Arc<dyn MethodCallTranslatorPlugin>]) -> Self {
        self.method_translators = MethodCallTranslatorProvider::new(self.factory, plugins);
        self
    }

    /// Register member translator plugins
    pub fn with_member_plugins(mut self, plugins: &[Arc<dyn MemberTranslatorPlugin>]) -> Self {
        self.member_translators = MemberTranslatorProvider::new(plugins);
        self
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    pub fn factory(&self) -> &SqlExpressionFactory {
        &self.factory
    }

    /// Translate a scalar or predicate expression.
    ///
    /// Returns `Ok(None)` when the expression cannot be expressed against
    /// the document store. A `Some` result is fully type-mapped.
    pub fn translate(
        &self,
        select: &SelectStatement,
        expression: &Expression,
    ) -> QueryResult<Option<SqlExpression>> {
        let Some(translation) = self.visit_sql(select, expression)? else {
            debug!(%expression, "expression is not translatable");
            return Ok(None);
        };
        let Some(translation) = self.factory.apply_default_type_mapping(translation) else {
            debug!(%expression, "translated expression has no store type mapping");
            return Ok(None);
        };

        verify_type_mappings(&translation);
        Ok(Some(translation))
    }

    fn visit(
        &self,
        select: &SelectStatement,
        expression: &Expression,
    ) -> QueryResult<Option<QueryExpression>> {
        match expression {
            Expression::Constant(c) => Ok(Some(
                self.factory.constant(c.value.clone(), c.clr_type.clone()).into(),
            )),
            Expression::Parameter(p) => Ok(Some(
                self.factory.parameter(p.name.clone(), p.clr_type.clone()).into(),
            )),
            Expression::Member(m) => self.visit_member(select, m),
            Expression::MethodCall(m) => self.visit_method_call(select, expression, m),
            Expression::Binary(b) => self.visit_binary(select, b),
            Expression::Unary(u) => self.visit_unary(select, u),
            Expression::Conditional(c) => self.visit_conditional(select, c),
            Expression::New(_) | Expression::MemberInit(_) => {
                Ok(self.constant_or_none(expression).map(Into::into))
            }
            Expression::NewArray(_)
            | Expression::ListInit(_)
            | Expression::Lambda(_)
            | Expression::Invocation(_) => Ok(None),
            Expression::EntityShaper(s) => self.visit(select, &s.value_buffer),
            Expression::ProjectionBinding(p) => {
                Ok(Some(select.get_mapped_projection(&p.projection_member)?.clone()))
            }
            Expression::Query(q) => Ok(Some(q.clone())),
        }
    }

    /// Visit and keep only scalar results
    fn visit_sql(
        &self,
        select: &SelectStatement,
        expression: &Expression,
    ) -> QueryResult<Option<SqlExpression>> {
        Ok(self.visit(select, expression)?.and_then(QueryExpression::into_sql))
    }

    fn visit_member(
        &self,
        select: &SelectStatement,
        member: &MemberExpression,
    ) -> QueryResult<Option<QueryExpression>> {
        let Some(source) = member.expression.as_deref() else {
            return Ok(self
                .member_translators
                .translate(None, &member.member, &member.clr_type)
                .map(Into::into));
        };

        if let Some(bound) = self.try_bind_member(select, source, &member.member)? {
            return Ok(Some(bound));
        }
        let Some(instance) = self.visit_sql(select, source)? else {
            return Ok(None);
        };
        Ok(self
            .member_translators
            .translate(Some(&instance), &member.member, &member.clr_type)
            .map(Into::into))
    }

    /// Resolve `source.name` to a document field when `source` leads to an
    /// entity projection
    fn try_bind_member(
        &self,
        select: &SelectStatement,
        source: &Expression,
        name: &str,
    ) -> QueryResult<Option<QueryExpression>> {
        let (source, converted_type) = unwrap_type_conversion(source);
        let visited = match source {
            Expression::EntityShaper(s) => self.visit(select, &s.value_buffer)?,
            Expression::Member(MemberExpression {
                expression: Some(inner),
                member,
                ..
            }) => self.try_bind_member(select, inner, member)?,
            other => match other.property_arguments() {
                Some((inner, property)) => self.try_bind_member(select, inner, property)?,
                None => None,
            },
        };

        match visited {
            Some(QueryExpression::EntityProjection(projection)) => {
                let requested = converted_type.unwrap_or_else(|| projection.clr_type());
                projection.bind_member(&self.schema, name, Some(&requested), false)
            }
            _ => Ok(None),
        }
    }

    fn visit_method_call(
        &self,
        select: &SelectStatement,
        expression: &Expression,
        call: &MethodCallExpression,
    ) -> QueryResult<Option<QueryExpression>> {
        if let Some((source, name)) = expression.property_arguments() {
            return self.try_bind_member(select, source, name);
        }

        let instance = match call.object.as_deref() {
            Some(object) => match self.visit_sql(select, object)? {
                Some(instance) => Some(instance),
                None => return Ok(None),
            },
            None => None,
        };
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            match self.visit_sql(select, argument)? {
                Some(argument) => arguments.push(argument),
                None => return Ok(None),
            }
        }

        Ok(self
            .method_translators
            .translate(instance.as_ref(), &call.method, &arguments)
            .map(Into::into))
    }

    fn visit_binary(
        &self,
        select: &SelectStatement,
        binary: &BinaryExpression,
    ) -> QueryResult<Option<QueryExpression>> {
        if binary.op == BinaryOp::Coalesce {
            let left = binary.left.as_ref().clone();
            let rewritten = Expression::condition(
                Expression::not_equal(left.clone(), Expression::null(left.clr_type())),
                left,
                binary.right.as_ref().clone(),
            );
            return self.visit(select, &rewritten);
        }

        let Some(left) = self.visit_sql(select, remove_implicit_convert(&binary.left))? else {
            return Ok(None);
        };
        let Some(right) = self.visit_sql(select, remove_implicit_convert(&binary.right))? else {
            return Ok(None);
        };
        Ok(self.factory.make_binary(binary.op, left, right).map(Into::into))
    }

    fn visit_unary(
        &self,
        select: &SelectStatement,
        unary: &UnaryExpression,
    ) -> QueryResult<Option<QueryExpression>> {
        let Some(operand) = self.visit_sql(select, &unary.operand)? else {
            return Ok(None);
        };

        let translated = match unary.op {
            UnaryOp::Not => self.factory.not(operand),
            UnaryOp::Negate => self.factory.negate(operand),
            UnaryOp::Convert => {
                let source = operand.clr_type();
                let target = unary.clr_type.unwrap_nullable();
                if (unary.clr_type.is_interface() && source.implements(&unary.clr_type))
                    || *target == source
                    || *target == ClrType::EnumBase
                {
                    Some(operand)
                } else if unary.clr_type == ClrType::Object {
                    self.factory.convert(operand, ClrType::Object)
                } else {
                    None
                }
            }
            UnaryOp::TypeAs | UnaryOp::ArrayLength | UnaryOp::Quote => None,
        };
        Ok(translated.map(Into::into))
    }

    fn visit_conditional(
        &self,
        select: &SelectStatement,
        conditional: &ConditionalExpression,
    ) -> QueryResult<Option<QueryExpression>> {
        let Some(test) = self.visit_sql(select, &conditional.test)? else {
            return Ok(None);
        };
        let Some(if_true) = self.visit_sql(select, &conditional.if_true)? else {
            return Ok(None);
        };
        let Some(if_false) = self.visit_sql(select, &conditional.if_false)? else {
            return Ok(None);
        };
        Ok(self.factory.condition(test, if_true, if_false).map(Into::into))
    }

    /// Collapse a statically evaluable object construction into a literal
    fn constant_or_none(&self, expression: &Expression) -> Option<SqlExpression> {
        can_evaluate(expression)
            .then(|| self.factory.constant(evaluate(expression), expression.clr_type()))
    }
}

/// Strip conversions, returning the innermost operand and the last
/// conversion type that is neither `object` nor the operand's own type
fn unwrap_type_conversion(expression: &Expression) -> (&Expression, Option<ClrType>) {
    let mut current = expression;
    let mut converted_type = None;
    while let Expression::Unary(u) = current {
        if !matches!(u.op, UnaryOp::Convert | UnaryOp::TypeAs) {
            break;
        }
        current = u.operand.as_ref();
        if u.clr_type != ClrType::Object && u.clr_type != current.clr_type() {
            converted_type = Some(u.clr_type.clone());
        }
    }
    (current, converted_type)
}

/// Strip compiler-inserted widening of small integers and enums
fn remove_implicit_convert(expression: &Expression) -> &Expression {
    if let Expression::Unary(u) = expression {
        if u.op == UnaryOp::Convert {
            let operand_type = u.operand.clr_type();
            let inner = operand_type.unwrap_nullable();
            let inner = inner.enum_underlying().unwrap_or(inner);
            let converted = u.clr_type.unwrap_nullable();
            if inner == converted || (*converted == ClrType::Int32 && inner.widens_to_int()) {
                return remove_implicit_convert(&u.operand);
            }
        }
    }
    expression
}

fn can_evaluate(expression: &Expression) -> bool {
    match expression {
        Expression::Constant(_) => true,
        Expression::New(n) => n.arguments.iter().all(can_evaluate),
        Expression::MemberInit(m) => {
            m.new_expression.arguments.iter().all(can_evaluate)
                && m.bindings.iter().all(|b| can_evaluate(&b.expression))
        }
        _ => false,
    }
}

fn evaluate(expression: &Expression) -> Value {
    match expression {
        Expression::Constant(c) => c.value.clone(),
        Expression::New(n) => evaluate_new(n),
        Expression::MemberInit(m) => {
            let mut object = match evaluate_new(&m.new_expression) {
                Value::Object(object) => object,
                // positional arguments are keyed by their index
                Value::Array(arguments) => arguments
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| (index.to_string(), value))
                    .collect(),
                _ => Map::new(),
            };
            for binding in &m.bindings {
                object.insert(binding.member.clone(), evaluate(&binding.expression));
            }
            Value::Object(object)
        }
        _ => Value::Null,
    }
}

/// Named constructions become objects; positional ones become arrays
fn evaluate_new(new: &NewExpression) -> Value {
    if new.arguments.is_empty() || new.members.len() == new.arguments.len() {
        Value::Object(named_arguments(new))
    } else {
        Value::Array(new.arguments.iter().map(evaluate).collect())
    }
}

fn named_arguments(new: &NewExpression) -> Map<String, Value> {
    new.members
        .iter()
        .zip(&new.arguments)
        .map(|(member, argument)| (member.clone(), evaluate(argument)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MemberAssignment;
    use crate::metadata::{ConventionSet, EntityType, ModelBuilder, Property};
    use crate::query::ProjectionMember;

    fn create_test_schema() -> Arc<DocumentSchema> {
        Arc::new(
            ModelBuilder::new()
                .with_entity_type(
                    EntityType::new("Family")
                        .with_property(Property::new("Id", ClrType::ObjectId))
                        .with_property(Property::new("LastName", ClrType::String))
                        .with_property(Property::new("Rank", ClrType::Int16)),
                )
                .finalize(&ConventionSet::default())
                .unwrap(),
        )
    }

    fn family() -> Expression {
        Expression::entity_shaper(
            "Family",
            Expression::projection_binding(ProjectionMember::root(), ClrType::entity("Family")),
        )
    }

    fn setup() -> (SqlTranslator, SelectStatement) {
        let schema = create_test_schema();
        let select = SelectStatement::new(&schema, schema.entity_type("Family").unwrap()).unwrap();
        (SqlTranslator::new(schema), select)
    }

    #[test]
    fn test_translate_member_comparison() {
        let (translator, select) = setup();
        let predicate = Expression::equal(
            Expression::member(family(), "LastName", ClrType::String),
            Expression::constant("Wakefield", ClrType::String),
        );
        let sql = translator.translate(&select, &predicate).unwrap().unwrap();
        assert_eq!(sql.to_string(), "(c[\"LastName\"] == \"Wakefield\")");
    }

    #[test]
    fn test_widening_convert_is_stripped() {
        let (translator, select) = setup();
        let predicate = Expression::binary(
            BinaryOp::GreaterThan,
            Expression::convert(
                Expression::member(family(), "Rank", ClrType::Int16),
                ClrType::Int32,
            ),
            Expression::constant(3, ClrType::Int32),
        );
        let SqlExpression::Binary(b) = translator.translate(&select, &predicate).unwrap().unwrap()
        else {
            panic!("expected a comparison");
        };
        assert!(matches!(b.left, SqlExpression::KeyAccess(_)));
        assert_eq!(b.right.type_mapping().unwrap().clr_type(), &ClrType::Int16);
    }

    #[test]
    fn test_lambda_is_untranslatable() {
        let (translator, select) = setup();
        let lambda = Expression::lambda(Vec::new(), Expression::constant(true, ClrType::Bool));
        assert_eq!(translator.translate(&select, &lambda).unwrap(), None);
    }

    #[test]
    fn test_anonymous_construction_becomes_constant() {
        let (translator, select) = setup();
        let anonymous = Expression::new_object(
            ClrType::Anonymous("<>f__AnonymousType0".to_string()),
            vec!["A".to_string(), "B".to_string()],
            vec![
                Expression::constant(1, ClrType::Int32),
                Expression::constant("x", ClrType::String),
            ],
        );
        let visited = translator.visit_sql(&select, &anonymous).unwrap().unwrap();
        let SqlExpression::Constant(constant) = visited else {
            panic!("expected a constant");
        };
        assert_eq!(constant.value, serde_json::json!({"A": 1, "B": "x"}));

        // An anonymous object alone has no store mapping
        assert_eq!(translator.translate(&select, &anonymous).unwrap(), None);
    }

    #[test]
    fn test_member_init_with_parameter_is_untranslatable() {
        let (translator, select) = setup();
        let init = Expression::MemberInit(crate::ast::MemberInitExpression {
            new_expression: NewExpression {
                clr_type: ClrType::Class("Range".to_string()),
                arguments: Vec::new(),
                members: Vec::new(),
            },
            bindings: vec![MemberAssignment {
                member: "From".to_string(),
                expression: Expression::parameter("from", ClrType::Int32),
            }],
        });
        assert!(!can_evaluate(&init));
        assert_eq!(translator.translate(&select, &init).unwrap(), None);
    }

    #[test]
    fn test_positional_member_init_collapses_to_constant() {
        let (translator, select) = setup();
        let init = Expression::MemberInit(crate::ast::MemberInitExpression {
            new_expression: NewExpression {
                clr_type: ClrType::Class("Range".to_string()),
                arguments: vec![
                    Expression::constant(1, ClrType::Int32),
                    Expression::constant(2, ClrType::Int32),
                ],
                members: Vec::new(),
            },
            bindings: vec![MemberAssignment {
                member: "Step".to_string(),
                expression: Expression::constant(3, ClrType::Int32),
            }],
        });
        assert!(can_evaluate(&init));

        let visited = translator.visit_sql(&select, &init).unwrap().unwrap();
        let SqlExpression::Constant(constant) = visited else {
            panic!("expected a constant");
        };
        assert_eq!(constant.value, serde_json::json!({"0": 1, "1": 2, "Step": 3}));
    }

    #[test]
    fn test_unknown_projection_member_is_an_error() {
        let (translator, select) = setup();
        let binding = Expression::projection_binding(
            ProjectionMember::from_path(&["Missing"]),
            ClrType::String,
        );
        assert!(translator.translate(&select, &binding).is_err());
    }
}
