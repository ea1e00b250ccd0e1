//! Document query IR
//!
//! Scalar and predicate nodes form the closed [`SqlExpression`] sum type;
//! shapes of whole documents and embedded arrays live alongside them in
//! [`QueryExpression`]. Nodes are immutable and rebuilt on rewrite.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::ast::{BinaryOp, ClrType};
use crate::metadata::{EntityType, Navigation, Property};

use super::entity_projection::{EntityProjection, ObjectArrayProjection};
use super::type_mapping::TypeMapping;

/// Logical path identifying one position in a query's output shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProjectionMember(Vec<String>);

impl ProjectionMember {
    /// The empty member, standing for the query's root entity
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_path(path: &[&str]) -> Self {
        Self(path.iter().map(|m| m.to_string()).collect())
    }

    /// A new member one level deeper
    pub fn append(&self, member: impl Into<String>) -> Self {
        let mut path = self.0.clone();
        path.push(member.into());
        Self(path)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProjectionMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

/// The anchor alias of a document
#[derive(Debug, Clone, PartialEq)]
pub struct RootReference {
    pub entity_type: Arc<EntityType>,
    pub alias: String,
}

impl RootReference {
    pub fn new(entity_type: Arc<EntityType>, alias: impl Into<String>) -> Self {
        Self {
            entity_type,
            alias: alias.into(),
        }
    }
}

/// An embedded object reached through a to-one navigation
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectAccess {
    pub navigation: Navigation,
    /// Element name of the embedded object
    pub name: String,
    pub access: AccessExpression,
}

/// Something a field path can be rooted at
#[derive(Debug, Clone, PartialEq)]
pub enum AccessExpression {
    Root(RootReference),
    Object(Box<ObjectAccess>),
}

impl AccessExpression {
    pub fn name(&self) -> &str {
        match self {
            AccessExpression::Root(r) => &r.alias,
            AccessExpression::Object(o) => &o.name,
        }
    }

    /// Element names from the document root down to this access
    pub fn path(&self) -> Vec<&str> {
        match self {
            AccessExpression::Root(_) => Vec::new(),
            AccessExpression::Object(o) => {
                let mut path = o.access.path();
                path.push(&o.name);
                path
            }
        }
    }
}

impl fmt::Display for AccessExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessExpression::Root(r) => write!(f, "{}", r.alias),
            AccessExpression::Object(o) => write!(f, "{}[\"{}\"]", o.access, o.name),
        }
    }
}

/// A scalar field of a document
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAccess {
    pub property: Property,
    /// Element name; empty when the property has no physical field
    pub name: String,
    pub access: AccessExpression,
    pub type_mapping: Option<TypeMapping>,
}

impl KeyAccess {
    /// Element names from the document root down to this field
    pub fn path(&self) -> Vec<&str> {
        let mut path = self.access.path();
        path.push(&self.name);
        path
    }
}

/// Unary operators of the IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlUnaryOp {
    Not,
    Negate,
    /// Boxing conversion to `object`
    Convert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlBinaryExpression {
    pub op: BinaryOp,
    pub left: SqlExpression,
    pub right: SqlExpression,
    pub clr_type: ClrType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlUnaryExpression {
    pub op: SqlUnaryOp,
    pub operand: SqlExpression,
    pub clr_type: ClrType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlConditionalExpression {
    pub test: SqlExpression,
    pub if_true: SqlExpression,
    pub if_false: SqlExpression,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlFunctionExpression {
    pub name: String,
    pub arguments: Vec<SqlExpression>,
    pub clr_type: ClrType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlConstantExpression {
    pub value: Value,
    pub clr_type: ClrType,
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameterExpression {
    pub name: String,
    pub clr_type: ClrType,
    pub type_mapping: Option<TypeMapping>,
}

/// `item IN values`
#[derive(Debug, Clone, PartialEq)]
pub struct InExpression {
    pub item: SqlExpression,
    pub values: SqlExpression,
    pub negated: bool,
    pub type_mapping: Option<TypeMapping>,
}

impl InExpression {
    /// The same test with its polarity flipped
    pub fn negate(&self) -> Self {
        Self {
            negated: !self.negated,
            ..self.clone()
        }
    }
}

/// Scalar or predicate node
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpression {
    KeyAccess(KeyAccess),
    Binary(Box<SqlBinaryExpression>),
    Unary(Box<SqlUnaryExpression>),
    Conditional(Box<SqlConditionalExpression>),
    Function(SqlFunctionExpression),
    Constant(SqlConstantExpression),
    Parameter(SqlParameterExpression),
    In(Box<InExpression>),
}

impl SqlExpression {
    pub fn clr_type(&self) -> ClrType {
        match self {
            SqlExpression::KeyAccess(k) => k.property.clr_type.clone(),
            SqlExpression::Binary(b) => b.clr_type.clone(),
            SqlExpression::Unary(u) => u.clr_type.clone(),
            SqlExpression::Conditional(c) => c.if_true.clr_type(),
            SqlExpression::Function(f) => f.clr_type.clone(),
            SqlExpression::Constant(c) => c.clr_type.clone(),
            SqlExpression::Parameter(p) => p.clr_type.clone(),
            SqlExpression::In(_) => ClrType::Bool,
        }
    }

    pub fn type_mapping(&self) -> Option<&TypeMapping> {
        match self {
            SqlExpression::KeyAccess(k) => k.type_mapping.as_ref(),
            SqlExpression::Binary(b) => b.type_mapping.as_ref(),
            SqlExpression::Unary(u) => u.type_mapping.as_ref(),
            SqlExpression::Conditional(c) => c.type_mapping.as_ref(),
            SqlExpression::Function(f) => f.type_mapping.as_ref(),
            SqlExpression::Constant(c) => c.type_mapping.as_ref(),
            SqlExpression::Parameter(p) => p.type_mapping.as_ref(),
            SqlExpression::In(i) => i.type_mapping.as_ref(),
        }
    }

    /// The literal `true`
    pub fn is_true_constant(&self) -> bool {
        matches!(self, SqlExpression::Constant(c) if c.value == Value::Bool(true))
    }

    /// Direct children, in evaluation order
    pub fn children(&self) -> Vec<&SqlExpression> {
        match self {
            SqlExpression::KeyAccess(_)
            | SqlExpression::Constant(_)
            | SqlExpression::Parameter(_) => Vec::new(),
            SqlExpression::Binary(b) => vec![&b.left, &b.right],
            SqlExpression::Unary(u) => vec![&u.operand],
            SqlExpression::Conditional(c) => vec![&c.test, &c.if_true, &c.if_false],
            SqlExpression::Function(f) => f.arguments.iter().collect(),
            SqlExpression::In(i) => vec![&i.item, &i.values],
        }
    }
}

impl fmt::Display for SqlExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlExpression::KeyAccess(k) => write!(f, "{}[\"{}\"]", k.access, k.name),
            SqlExpression::Binary(b) => write!(f, "({} {} {})", b.left, b.op.symbol(), b.right),
            SqlExpression::Unary(u) => match u.op {
                SqlUnaryOp::Not => write!(f, "NOT({})", u.operand),
                SqlUnaryOp::Negate => write!(f, "-{}", u.operand),
                SqlUnaryOp::Convert => write!(f, "CAST({} AS {})", u.operand, u.clr_type),
            },
            SqlExpression::Conditional(c) => {
                write!(f, "({} ? {} : {})", c.test, c.if_true, c.if_false)
            }
            SqlExpression::Function(func) => {
                write!(f, "{}(", func.name)?;
                for (i, arg) in func.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            SqlExpression::Constant(c) => write!(f, "{}", c.value),
            SqlExpression::Parameter(p) => write!(f, "@{}", p.name),
            SqlExpression::In(i) => {
                let op = if i.negated { "NOT IN" } else { "IN" };
                write!(f, "{} {} ({})", i.item, op, i.values)
            }
        }
    }
}

/// Ordering term
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub expression: SqlExpression,
    pub ascending: bool,
}

impl Ordering {
    pub fn new(expression: SqlExpression, ascending: bool) -> Self {
        Self {
            expression,
            ascending,
        }
    }

    /// The same term in the opposite direction
    pub fn reversed(&self) -> Self {
        Self::new(self.expression.clone(), !self.ascending)
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "{} {}", self.expression, direction)
    }
}

/// One output field of a select statement
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expression: QueryExpression,
    pub alias: String,
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alias.is_empty() || self.expression.name() == Some(self.alias.as_str()) {
            write!(f, "{}", self.expression)
        } else {
            write!(f, "{} AS {}", self.expression, self.alias)
        }
    }
}

/// Any node of the document query IR
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    Sql(SqlExpression),
    EntityProjection(Rc<EntityProjection>),
    ObjectArrayProjection(Rc<ObjectArrayProjection>),
}

impl QueryExpression {
    pub fn clr_type(&self) -> ClrType {
        match self {
            QueryExpression::Sql(s) => s.clr_type(),
            QueryExpression::EntityProjection(p) => p.clr_type(),
            QueryExpression::ObjectArrayProjection(p) => p.clr_type(),
        }
    }

    /// Natural field name of named accesses
    pub fn name(&self) -> Option<&str> {
        match self {
            QueryExpression::Sql(SqlExpression::KeyAccess(k)) => Some(&k.name),
            QueryExpression::Sql(_) => None,
            QueryExpression::EntityProjection(p) => Some(p.name()),
            QueryExpression::ObjectArrayProjection(p) => Some(p.name()),
        }
    }

    pub fn as_sql(&self) -> Option<&SqlExpression> {
        match self {
            QueryExpression::Sql(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_sql(self) -> Option<SqlExpression> {
        match self {
            QueryExpression::Sql(s) => Some(s),
            _ => None,
        }
    }
}

impl From<KeyAccess> for SqlExpression {
    fn from(access: KeyAccess) -> Self {
        SqlExpression::KeyAccess(access)
    }
}

impl From<SqlExpression> for QueryExpression {
    fn from(expression: SqlExpression) -> Self {
        QueryExpression::Sql(expression)
    }
}

impl From<EntityProjection> for QueryExpression {
    fn from(projection: EntityProjection) -> Self {
        QueryExpression::EntityProjection(Rc::new(projection))
    }
}

impl From<ObjectArrayProjection> for QueryExpression {
    fn from(projection: ObjectArrayProjection) -> Self {
        QueryExpression::ObjectArrayProjection(Rc::new(projection))
    }
}

impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpression::Sql(s) => write!(f, "{}", s),
            QueryExpression::EntityProjection(p) => write!(f, "{}", p.access()),
            QueryExpression::ObjectArrayProjection(p) => {
                write!(f, "{}[\"{}\"]", p.access(), p.name())
            }
        }
    }
}
