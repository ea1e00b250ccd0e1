//! Rendering of finished select statements into document-store find plans
//!
//! Filters are emitted as aggregation expressions under `$expr`, so every IR
//! node maps onto one operator. Parameters are bound to literal values at
//! generation time.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::ast::{BinaryOp, ClrType};
use crate::metadata::DocumentSchema;

use super::error::{QueryError, QueryResult};
use super::expression::{
    AccessExpression, KeyAccess, Projection, QueryExpression, SqlExpression, SqlUnaryOp,
};
use super::select::SelectStatement;

/// One sort key of a find plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    pub path: String,
    pub ascending: bool,
}

/// Everything a document store needs to run a find
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindPlan {
    pub collection: String,
    pub filter: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    pub distinct: bool,
}

/// Renders select statements with a fixed set of parameter values
#[derive(Debug, Clone, Copy)]
pub struct QueryPlanGenerator<'a> {
    schema: &'a DocumentSchema,
    parameters: &'a HashMap<String, Value>,
}

impl<'a> QueryPlanGenerator<'a> {
    pub fn new(schema: &'a DocumentSchema, parameters: &'a HashMap<String, Value>) -> Self {
        Self { schema, parameters }
    }

    pub fn generate(&self, select: &SelectStatement) -> QueryResult<FindPlan> {
        let mut filters = Vec::new();
        if let Some(discriminators) = self.discriminator_filter(select) {
            filters.push(discriminators);
        }
        if let Some(predicate) = select.predicate() {
            filters.push(json!({ "$expr": self.render(predicate)? }));
        }
        let filter = match filters.len() {
            0 => json!({}),
            1 => filters.remove(0),
            _ => json!({ "$and": filters }),
        };

        let sort = select
            .orderings()
            .iter()
            .map(|ordering| match &ordering.expression {
                SqlExpression::KeyAccess(k) if !k.name.is_empty() => Ok(SortKey {
                    path: k.path().join("."),
                    ascending: ordering.ascending,
                }),
                other => Err(QueryError::UnsupportedOrdering(other.to_string())),
            })
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(FindPlan {
            collection: select.collection().to_string(),
            filter,
            projection: self.projection(select.projection())?,
            sort,
            skip: select.offset().map(|o| self.paging_value(o)).transpose()?,
            limit: select.limit().map(|l| self.paging_value(l)).transpose()?,
            distinct: select.is_distinct(),
        })
    }

    /// Restrict a derived type's query to its own discriminators
    fn discriminator_filter(&self, select: &SelectStatement) -> Option<Value> {
        let entity_type = select.entity_type();
        if !entity_type.is_derived_type() {
            return None;
        }

        let mut discriminators = vec![Value::from(self.schema.discriminator(entity_type))];
        discriminators.extend(
            self.schema
                .derived_types(entity_type)
                .iter()
                .filter(|t| !t.is_abstract)
                .map(|t| Value::from(self.schema.discriminator(t))),
        );
        if entity_type.is_abstract {
            discriminators.remove(0);
        }

        let mut filter = Map::new();
        filter.insert(
            self.schema.discriminator_element().to_string(),
            json!({ "$in": discriminators }),
        );
        Some(Value::Object(filter))
    }

    /// A lone root projection returns whole documents and needs no plan
    fn projection(&self, projection: &[Projection]) -> QueryResult<Option<Value>> {
        if let [single] = projection {
            if let QueryExpression::EntityProjection(p) = &single.expression {
                if matches!(p.access(), AccessExpression::Root(_)) {
                    return Ok(None);
                }
            }
        }
        if projection.is_empty() {
            return Ok(None);
        }

        let mut fields = Map::new();
        for p in projection {
            let value = match &p.expression {
                QueryExpression::Sql(sql) => self.render(sql)?,
                QueryExpression::EntityProjection(e) => match e.access() {
                    AccessExpression::Root(_) => Value::from("$$ROOT"),
                    access => field_path(&access.path()),
                },
                QueryExpression::ObjectArrayProjection(a) => field_path(&a.path()),
            };
            fields.insert(p.alias.clone(), value);
        }
        Ok(Some(Value::Object(fields)))
    }

    fn paging_value(&self, expression: &SqlExpression) -> QueryResult<u64> {
        let value = match expression {
            SqlExpression::Constant(c) => c.value.clone(),
            SqlExpression::Parameter(p) => self.parameter(&p.name)?.clone(),
            other => return Err(QueryError::InvalidPagingValue(other.to_string())),
        };
        value
            .as_u64()
            .ok_or_else(|| QueryError::InvalidPagingValue(value.to_string()))
    }

    fn parameter(&self, name: &str) -> QueryResult<&Value> {
        self.parameters
            .get(name)
            .ok_or_else(|| QueryError::UnboundParameter(name.to_string()))
    }

    /// Render one IR node as an aggregation expression
    pub fn render(&self, expression: &SqlExpression) -> QueryResult<Value> {
        match expression {
            SqlExpression::KeyAccess(k) => key_path(k),
            SqlExpression::Constant(c) => Ok(json!({ "$literal": c.value })),
            SqlExpression::Parameter(p) => Ok(json!({ "$literal": self.parameter(&p.name)? })),
            SqlExpression::Binary(b) => {
                let op = match b.op {
                    BinaryOp::Equal => "$eq",
                    BinaryOp::NotEqual => "$ne",
                    BinaryOp::LessThan => "$lt",
                    BinaryOp::LessThanOrEqual => "$lte",
                    BinaryOp::GreaterThan => "$gt",
                    BinaryOp::GreaterThanOrEqual => "$gte",
                    BinaryOp::AndAlso => "$and",
                    BinaryOp::OrElse => "$or",
                    BinaryOp::And if b.clr_type == ClrType::Bool => "$and",
                    BinaryOp::Or if b.clr_type == ClrType::Bool => "$or",
                    BinaryOp::Add => "$add",
                    BinaryOp::Subtract => "$subtract",
                    BinaryOp::Multiply => "$multiply",
                    BinaryOp::Divide => "$divide",
                    BinaryOp::Modulo => "$mod",
                    _ => return Err(QueryError::UnsupportedFilter(expression.to_string())),
                };
                Ok(json!({ op: [self.render(&b.left)?, self.render(&b.right)?] }))
            }
            SqlExpression::Unary(u) => match u.op {
                SqlUnaryOp::Not => Ok(json!({ "$not": [self.render(&u.operand)?] })),
                SqlUnaryOp::Negate => Ok(json!({ "$multiply": [self.render(&u.operand)?, -1] })),
                SqlUnaryOp::Convert => self.render(&u.operand),
            },
            SqlExpression::Conditional(c) => Ok(json!({
                "$cond": [
                    self.render(&c.test)?,
                    self.render(&c.if_true)?,
                    self.render(&c.if_false)?,
                ]
            })),
            SqlExpression::Function(f) => {
                let arguments = f
                    .arguments
                    .iter()
                    .map(|a| self.render(a))
                    .collect::<QueryResult<Vec<_>>>()?;
                let mut call = Map::new();
                call.insert(format!("${}", f.name), Value::Array(arguments));
                Ok(Value::Object(call))
            }
            SqlExpression::In(i) => {
                let test = json!({ "$in": [self.render(&i.item)?, self.render(&i.values)?] });
                if i.negated {
                    Ok(json!({ "$not": [test] }))
                } else {
                    Ok(test)
                }
            }
        }
    }
}

fn key_path(access: &KeyAccess) -> QueryResult<Value> {
    if access.name.is_empty() {
        return Err(QueryError::UnsupportedFilter(
            SqlExpression::KeyAccess(access.clone()).to_string(),
        ));
    }
    Ok(field_path(&access.path()))
}

fn field_path(path: &[&str]) -> Value {
    Value::from(format!("${}", path.join(".")))
}
