//! Method-call and member translator registries
//!
//! Translators receive already-translated operands and either produce an IR
//! node or decline with `None`. Providers try plugin translators first, then
//! the built-in ones, and return the first match.

use std::fmt;
use std::sync::Arc;

use crate::ast::{ClrType, MethodInfo};

use super::expression::{SqlExpression, SqlUnaryOp};
use super::factory::SqlExpressionFactory;

/// Translates calls to a family of methods
pub trait MethodCallTranslator: fmt::Debug + Send + Sync {
    fn translate(
        &self,
        instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Option<SqlExpression>;
}

/// Translates access to members the document does not store directly
pub trait MemberTranslator: fmt::Debug + Send + Sync {
    fn translate(
        &self,
        instance: Option<&SqlExpression>,
        member: &str,
        return_type: &ClrType,
    ) -> Option<SqlExpression>;
}

/// Supplies extra method-call translators
pub trait MethodCallTranslatorPlugin: Send + Sync {
    fn translators(&self) -> Vec<Arc<dyn MethodCallTranslator>>;
}

/// Supplies member translators
pub trait MemberTranslatorPlugin: Send + Sync {
    fn translators(&self) -> Vec<Arc<dyn MemberTranslator>>;
}

/// `a.Equals(b)` and `Equals(a, b)`
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualsTranslator {
    factory: SqlExpressionFactory,
}

impl EqualsTranslator {
    pub fn new(factory: SqlExpressionFactory) -> Self {
        Self { factory }
    }
}

impl MethodCallTranslator for EqualsTranslator {
    fn translate(
        &self,
        instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Option<SqlExpression> {
        if method.name != "Equals" {
            return None;
        }

        let (left, right) = match (instance, arguments) {
            (Some(instance), [argument]) => (instance.clone(), remove_object_convert(argument)),
            (None, [left, right]) => (remove_object_convert(left), remove_object_convert(right)),
            _ => return None,
        };

        // Values of different types are never equal
        if left.clr_type().unwrap_nullable() == right.clr_type().unwrap_nullable() {
            self.factory.equal(left, right)
        } else {
            Some(self.factory.constant(false, ClrType::Bool))
        }
    }
}

fn remove_object_convert(expression: &SqlExpression) -> SqlExpression {
    match expression {
        SqlExpression::Unary(u) if u.op == SqlUnaryOp::Convert && u.clr_type == ClrType::Object => {
            u.operand.clone()
        }
        other => other.clone(),
    }
}

/// `Enumerable.Contains(values, item)` and `list.Contains(item)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsTranslator {
    factory: SqlExpressionFactory,
}

impl ContainsTranslator {
    pub fn new(factory: SqlExpressionFactory) -> Self {
        Self { factory }
    }
}

impl MethodCallTranslator for ContainsTranslator {
    fn translate(
        &self,
        instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Option<SqlExpression> {
        match (instance, arguments) {
            (None, [values, item]) if method.is_enumerable_contains() => {
                self.factory.in_(item.clone(), values.clone(), false)
            }
            (Some(values), [item])
                if method.name == "Contains" && method.declaring_type.implements_list() =>
            {
                self.factory.in_(item.clone(), values.clone(), false)
            }
            _ => None,
        }
    }
}

/// Ordered method-call translators; the first non-`None` result wins
#[derive(Debug, Clone)]
pub struct MethodCallTranslatorProvider {
    translators: Vec<Arc<dyn MethodCallTranslator>>,
}

impl MethodCallTranslatorProvider {
    pub fn new(
        factory: SqlExpressionFactory,
        plugins: &[Arc<dyn MethodCallTranslatorPlugin>],
    ) -> Self {
        let mut translators: Vec<Arc<dyn MethodCallTranslator>> =
            plugins.iter().flat_map(|p| p.translators()).collect();
        translators.push(Arc::new(EqualsTranslator::new(factory)));
        translators.push(Arc::new(ContainsTranslator::new(factory)));
        Self { translators }
    }

    pub fn translate(
        &self,
        instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Option<SqlExpression> {
        self.translators
            .iter()
            .find_map(|t| t.translate(instance, method, arguments))
    }
}

impl Default for MethodCallTranslatorProvider {
    fn default() -> Self {
        Self::new(SqlExpressionFactory::default(), &[])
    }
}

/// Ordered member translators; there are no built-in ones
#[derive(Debug, Clone, Default)]
pub struct MemberTranslatorProvider {
    translators: Vec<Arc<dyn MemberTranslator>>,
}

impl MemberTranslatorProvider {
    pub fn new(plugins: &[Arc<dyn MemberTranslatorPlugin>]) -> Self {
        Self {
            translators: plugins.iter().flat_map(|p| p.translators()).collect(),
        }
    }

    pub fn translate(
        &self,
        instance: Option<&SqlExpression>,
        member: &str,
        return_type: &ClrType,
    ) -> Option<SqlExpression> {
        self.translators
            .iter()
            .find_map(|t| t.translate(instance, member, return_type))
    }
}
