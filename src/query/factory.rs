//! Construction of IR nodes with type-mapping inference
//!
//! Leaves (constants and parameters) may be created without a mapping.
//! Every composite node built here infers its children's mappings from their
//! siblings, so a successfully built node is fully mapped. A `None` result
//! means some leaf has a type documents cannot hold.

use serde_json::Value;

use crate::ast::{BinaryOp, ClrType};

use super::expression::{
    InExpression, SqlBinaryExpression, SqlConditionalExpression, SqlConstantExpression,
    SqlExpression, SqlFunctionExpression, SqlParameterExpression, SqlUnaryExpression, SqlUnaryOp,
};
use super::type_mapping::{TypeMapping, TypeMappingSource};

/// Builds IR nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlExpressionFactory {
    type_mappings: TypeMappingSource,
}

impl SqlExpressionFactory {
    pub fn new(type_mappings: TypeMappingSource) -> Self {
        Self { type_mappings }
    }

    pub fn find_mapping(&self, clr_type: &ClrType) -> Option<TypeMapping> {
        self.type_mappings.find_mapping(clr_type)
    }

    /// Map the node and its subtree, using `inferred` for unmapped leaves
    pub fn apply_type_mapping(
        &self,
        expression: SqlExpression,
        inferred: Option<&TypeMapping>,
    ) -> Option<SqlExpression> {
        if expression.type_mapping().is_some() {
            return Some(expression);
        }

        match expression {
            SqlExpression::Constant(mut c) => {
                c.type_mapping = Some(self.resolve(inferred, &c.clr_type)?);
                Some(SqlExpression::Constant(c))
            }
            SqlExpression::Parameter(mut p) => {
                p.type_mapping = Some(self.resolve(inferred, &p.clr_type)?);
                Some(SqlExpression::Parameter(p))
            }
            SqlExpression::KeyAccess(mut k) => {
                k.type_mapping = Some(self.resolve(inferred, &k.property.clr_type)?);
                Some(SqlExpression::KeyAccess(k))
            }
            SqlExpression::Binary(b) => {
                let SqlBinaryExpression {
                    op, left, right, ..
                } = *b;
                self.make_binary(op, left, right)
            }
            SqlExpression::Unary(u) => match u.op {
                SqlUnaryOp::Not => self.not(u.operand),
                SqlUnaryOp::Negate => self.negate(u.operand),
                SqlUnaryOp::Convert => self.convert(u.operand, u.clr_type),
            },
            SqlExpression::Conditional(c) => {
                let SqlConditionalExpression {
                    test,
                    if_true,
                    if_false,
                    ..
                } = *c;
                self.condition(test, if_true, if_false)
            }
            SqlExpression::Function(f) => self.function(f.name, f.arguments, f.clr_type),
            SqlExpression::In(i) => {
                let InExpression {
                    item,
                    values,
                    negated,
                    ..
                } = *i;
                self.in_(item, values, negated)
            }
        }
    }

    /// Map a top-level node with no surrounding context
    pub fn apply_default_type_mapping(&self, expression: SqlExpression) -> Option<SqlExpression> {
        self.apply_type_mapping(expression, None)
    }

    fn resolve(&self, inferred: Option<&TypeMapping>, clr_type: &ClrType) -> Option<TypeMapping> {
        inferred.cloned().or_else(|| self.find_mapping(clr_type))
    }

    /// Binary node; each operand without a mapping takes its sibling's
    /// (left-biased when both carry one). Coalesce is never built.
    pub fn make_binary(
        &self,
        op: BinaryOp,
        left: SqlExpression,
        right: SqlExpression,
    ) -> Option<SqlExpression> {
        if op == BinaryOp::Coalesce {
            return None;
        }

        let inferred = left.type_mapping().or(right.type_mapping()).cloned();
        let left = self.apply_type_mapping(left, inferred.as_ref())?;
        let right = self.apply_type_mapping(right, inferred.as_ref())?;

        let (clr_type, type_mapping) = if op.is_comparison() || op.is_logical() {
            (ClrType::Bool, self.find_mapping(&ClrType::Bool))
        } else {
            (left.clr_type(), left.type_mapping().cloned())
        };
        Some(SqlExpression::Binary(Box::new(SqlBinaryExpression {
            op,
            left,
            right,
            clr_type,
            type_mapping,
        })))
    }

    pub fn equal(&self, left: SqlExpression, right: SqlExpression) -> Option<SqlExpression> {
        self.make_binary(BinaryOp::Equal, left, right)
    }

    pub fn not_equal(&self, left: SqlExpression, right: SqlExpression) -> Option<SqlExpression> {
        self.make_binary(BinaryOp::NotEqual, left, right)
    }

    pub fn and_also(&self, left: SqlExpression, right: SqlExpression) -> Option<SqlExpression> {
        self.make_binary(BinaryOp::AndAlso, left, right)
    }

    pub fn or_else(&self, left: SqlExpression, right: SqlExpression) -> Option<SqlExpression> {
        self.make_binary(BinaryOp::OrElse, left, right)
    }

    pub fn not(&self, operand: SqlExpression) -> Option<SqlExpression> {
        let operand = self.apply_type_mapping(operand, None)?;
        Some(SqlExpression::Unary(Box::new(SqlUnaryExpression {
            op: SqlUnaryOp::Not,
            operand,
            clr_type: ClrType::Bool,
            type_mapping: self.find_mapping(&ClrType::Bool),
        })))
    }

    pub fn negate(&self, operand: SqlExpression) -> Option<SqlExpression> {
        let operand = self.apply_type_mapping(operand, None)?;
        Some(SqlExpression::Unary(Box::new(SqlUnaryExpression {
            op: SqlUnaryOp::Negate,
            clr_type: operand.clr_type(),
            type_mapping: operand.type_mapping().cloned(),
            operand,
        })))
    }

    /// Boxing conversion; the stored value keeps its operand's mapping
    pub fn convert(&self, operand: SqlExpression, clr_type: ClrType) -> Option<SqlExpression> {
        let operand = self.apply_type_mapping(operand, None)?;
        Some(SqlExpression::Unary(Box::new(SqlUnaryExpression {
            op: SqlUnaryOp::Convert,
            clr_type,
            type_mapping: operand.type_mapping().cloned(),
            operand,
        })))
    }

    pub fn condition(
        &self,
        test: SqlExpression,
        if_true: SqlExpression,
        if_false: SqlExpression,
    ) -> Option<SqlExpression> {
        let test = self.apply_type_mapping(test, None)?;
        let inferred = if_true.type_mapping().or(if_false.type_mapping()).cloned();
        let if_true = self.apply_type_mapping(if_true, inferred.as_ref())?;
        let if_false = self.apply_type_mapping(if_false, inferred.as_ref())?;
        let type_mapping = if_true.type_mapping().or(if_false.type_mapping()).cloned();
        Some(SqlExpression::Conditional(Box::new(SqlConditionalExpression {
            test,
            if_true,
            if_false,
            type_mapping,
        })))
    }

    /// Unmapped literal
    pub fn constant(&self, value: impl Into<Value>, clr_type: ClrType) -> SqlExpression {
        SqlExpression::Constant(SqlConstantExpression {
            value: value.into(),
            clr_type,
            type_mapping: None,
        })
    }

    /// Unmapped query parameter
    pub fn parameter(&self, name: impl Into<String>, clr_type: ClrType) -> SqlExpression {
        SqlExpression::Parameter(SqlParameterExpression {
            name: name.into(),
            clr_type,
            type_mapping: None,
        })
    }

    pub fn function(
        &self,
        name: impl Into<String>,
        arguments: Vec<SqlExpression>,
        clr_type: ClrType,
    ) -> Option<SqlExpression> {
        let arguments = arguments
            .into_iter()
            .map(|a| self.apply_type_mapping(a, None))
            .collect::<Option<Vec<_>>>()?;
        Some(SqlExpression::Function(SqlFunctionExpression {
            name: name.into(),
            arguments,
            type_mapping: Some(self.find_mapping(&clr_type)?),
            clr_type,
        }))
    }

    /// `item IN values`
    pub fn in_(
        &self,
        item: SqlExpression,
        values: SqlExpression,
        negated: bool,
    ) -> Option<SqlExpression> {
        let item = self.apply_type_mapping(item, None)?;
        let values = self.apply_type_mapping(values, None)?;
        Some(SqlExpression::In(Box::new(InExpression {
            item,
            values,
            negated,
            type_mapping: self.find_mapping(&ClrType::Bool),
        })))
    }
}

/// Walk a translated tree and abort on any node left without a mapping.
///
/// Translation only returns fully mapped trees, so reaching the panic means
/// the translator itself is broken.
pub fn verify_type_mappings(expression: &SqlExpression) {
    if expression.type_mapping().is_none() {
        panic!(
            "expression '{}' reached verification without a type mapping",
            expression
        );
    }
    for child in expression.children() {
        verify_type_mappings(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> SqlExpressionFactory {
        SqlExpressionFactory::default()
    }

    #[test]
    fn test_sibling_mapping_inference() {
        let f = factory();
        let enum_type = ClrType::enumeration("Color", ClrType::Int32);
        let left = f
            .apply_default_type_mapping(f.parameter("color", enum_type.clone()))
            .unwrap();
        let right = f.constant(2, ClrType::Int32);

        let SqlExpression::Binary(b) = f.equal(left, right).unwrap() else {
            panic!("expected a binary node");
        };
        assert_eq!(b.clr_type, ClrType::Bool);
        assert_eq!(b.type_mapping, Some(TypeMapping::new(ClrType::Bool)));
        assert_eq!(b.right.type_mapping(), Some(&TypeMapping::new(enum_type)));
    }

    #[test]
    fn test_arithmetic_takes_operand_mapping() {
        let f = factory();
        let sum = f
            .make_binary(
                BinaryOp::Add,
                f.constant(1, ClrType::Int64),
                f.constant(2, ClrType::Int64),
            )
            .unwrap();
        assert_eq!(sum.clr_type(), ClrType::Int64);
        assert_eq!(sum.type_mapping(), Some(&TypeMapping::new(ClrType::Int64)));
    }

    #[test]
    fn test_coalesce_is_never_built() {
        let f = factory();
        assert!(f
            .make_binary(
                BinaryOp::Coalesce,
                f.constant(Value::Null, ClrType::String),
                f.constant("x", ClrType::String),
            )
            .is_none());
    }

    #[test]
    fn test_unmappable_leaf_fails() {
        let f = factory();
        assert!(f
            .apply_default_type_mapping(f.constant(Value::Null, ClrType::Object))
            .is_none());
        assert!(f
            .not_equal(
                f.constant(Value::Null, ClrType::Object),
                f.constant(Value::Null, ClrType::Object),
            )
            .is_none());
    }

    #[test]
    fn test_conditional_branches_share_mapping() {
        let f = factory();
        let test = f.constant(true, ClrType::Bool);
        let if_true = f
            .apply_default_type_mapping(f.parameter("name", ClrType::String))
            .unwrap();
        let if_false = f.constant(Value::Null, ClrType::String);
        let conditional = f.condition(test, if_true, if_false).unwrap();
        verify_type_mappings(&conditional);
        assert_eq!(conditional.type_mapping(), Some(&TypeMapping::new(ClrType::String)));
    }

    #[test]
    fn test_in_is_not_negated() {
        let f = factory();
        let node = f
            .in_(
                f.parameter("name", ClrType::String),
                f.constant(vec!["a", "b"], ClrType::list(ClrType::String)),
                false,
            )
            .unwrap();
        let SqlExpression::In(in_expression) = &node else {
            panic!("expected an IN node");
        };
        assert!(!in_expression.negated);
        assert!(in_expression.negate().negated);
        verify_type_mappings(&node);
    }

    #[test]
    #[should_panic(expected = "without a type mapping")]
    fn test_verify_rejects_unmapped_nodes() {
        let f = factory();
        verify_type_mappings(&f.constant(1, ClrType::Int32));
    }
}
