//! Input expression tree consumed by the query translator
//!
//! These nodes mirror the shape of a LINQ-style query: member access, method
//! calls, operators, constants and parameters, plus the entity-shaping
//! placeholders inserted by the query-shape layer before scalar translation.

use std::fmt;

use serde_json::Value;

use crate::query::{ProjectionMember, QueryExpression};

/// Declaring class of the generic sequence extension methods (`Contains`, ...)
pub const ENUMERABLE_CLASS: &str = "Enumerable";

/// Declaring class of the property-by-name accessor `EF.Property<T>(entity, "Name")`
pub const PROPERTY_ACCESSOR_CLASS: &str = "EF";

/// Runtime type of an expression node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClrType {
    Bool,
    Byte,
    SByte,
    Char,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    String,
    ObjectId,
    Guid,
    DateTime,
    /// Byte array
    Bytes,
    /// The universal base type
    Object,
    /// A concrete enum with its underlying integral type
    Enum { name: String, underlying: Box<ClrType> },
    /// The abstract base of all enums
    EnumBase,
    Nullable(Box<ClrType>),
    /// A mapped entity type, by name
    Entity(String),
    /// Any other class or static class, by name
    Class(String),
    /// A compiler-generated anonymous type
    Anonymous(String),
    /// Generic sequence interface (`IEnumerable<T>`)
    Sequence(Box<ClrType>),
    /// Generic collection interface (`ICollection<T>`)
    Collection(Box<ClrType>),
    List(Box<ClrType>),
    Array(Box<ClrType>),
}

impl ClrType {
    pub fn nullable(inner: ClrType) -> Self {
        match inner {
            ClrType::Nullable(_) => inner,
            other => ClrType::Nullable(Box::new(other)),
        }
    }

    pub fn enumeration(name: impl Into<String>, underlying: ClrType) -> Self {
        ClrType::Enum {
            name: name.into(),
            underlying: Box::new(underlying),
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        ClrType::Entity(name.into())
    }

    pub fn sequence(element: ClrType) -> Self {
        ClrType::Sequence(Box::new(element))
    }

    pub fn list(element: ClrType) -> Self {
        ClrType::List(Box::new(element))
    }

    pub fn array(element: ClrType) -> Self {
        ClrType::Array(Box::new(element))
    }

    /// Strip a single level of `Nullable<T>`
    pub fn unwrap_nullable(&self) -> &ClrType {
        match self {
            ClrType::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ClrType::Nullable(_))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, ClrType::Sequence(_) | ClrType::Collection(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, ClrType::Enum { .. })
    }

    /// Underlying integral type of an enum
    pub fn enum_underlying(&self) -> Option<&ClrType> {
        match self {
            ClrType::Enum { underlying, .. } => Some(underlying),
            _ => None,
        }
    }

    /// Small integral types that the compiler implicitly widens to `int`
    pub fn widens_to_int(&self) -> bool {
        matches!(
            self,
            ClrType::Byte | ClrType::SByte | ClrType::Char | ClrType::Int16 | ClrType::UInt16
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            ClrType::Byte
                | ClrType::SByte
                | ClrType::Int16
                | ClrType::UInt16
                | ClrType::Int32
                | ClrType::UInt32
                | ClrType::Int64
                | ClrType::UInt64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral()
            || matches!(self, ClrType::Single | ClrType::Double | ClrType::Decimal)
    }

    /// Value types: primitives, enums, nullables and the struct-like scalars
    pub fn is_value_type(&self) -> bool {
        match self {
            ClrType::Bool
            | ClrType::Char
            | ClrType::ObjectId
            | ClrType::Guid
            | ClrType::DateTime
            | ClrType::Enum { .. }
            | ClrType::Nullable(_) => true,
            other => other.is_numeric(),
        }
    }

    /// Element type of a sequence-like type
    pub fn sequence_element(&self) -> Option<&ClrType> {
        match self {
            ClrType::Sequence(e)
            | ClrType::Collection(e)
            | ClrType::List(e)
            | ClrType::Array(e) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Whether this type implements the given interface type
    pub fn implements(&self, interface: &ClrType) -> bool {
        match interface {
            ClrType::Sequence(element) => match self {
                ClrType::Collection(e) | ClrType::List(e) | ClrType::Array(e) => e == element,
                ClrType::String => **element == ClrType::Char,
                _ => false,
            },
            ClrType::Collection(element) => match self {
                ClrType::List(e) | ClrType::Array(e) => e == element,
                _ => false,
            },
            _ => false,
        }
    }

    /// Types exposing list/collection `Contains(item)` semantics
    pub fn implements_list(&self) -> bool {
        matches!(
            self,
            ClrType::List(_) | ClrType::Array(_) | ClrType::Collection(_)
        )
    }
}

impl fmt::Display for ClrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClrType::Bool => write!(f, "bool"),
            ClrType::Byte => write!(f, "byte"),
            ClrType::SByte => write!(f, "sbyte"),
            ClrType::Char => write!(f, "char"),
            ClrType::Int16 => write!(f, "short"),
            ClrType::UInt16 => write!(f, "ushort"),
            ClrType::Int32 => write!(f, "int"),
            ClrType::UInt32 => write!(f, "uint"),
            ClrType::Int64 => write!(f, "long"),
            ClrType::UInt64 => write!(f, "ulong"),
            ClrType::Single => write!(f, "float"),
            ClrType::Double => write!(f, "double"),
            ClrType::Decimal => write!(f, "decimal"),
            ClrType::String => write!(f, "string"),
            ClrType::ObjectId => write!(f, "ObjectId"),
            ClrType::Guid => write!(f, "Guid"),
            ClrType::DateTime => write!(f, "DateTime"),
            ClrType::Bytes => write!(f, "byte[]"),
            ClrType::Object => write!(f, "object"),
            ClrType::Enum { name, .. } => write!(f, "{}", name),
            ClrType::EnumBase => write!(f, "Enum"),
            ClrType::Nullable(inner) => write!(f, "{}?", inner),
            ClrType::Entity(name) | ClrType::Class(name) | ClrType::Anonymous(name) => {
                write!(f, "{}", name)
            }
            ClrType::Sequence(e) => write!(f, "IEnumerable<{}>", e),
            ClrType::Collection(e) => write!(f, "ICollection<{}>", e),
            ClrType::List(e) => write!(f, "List<{}>", e),
            ClrType::Array(e) => write!(f, "{}[]", e),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    ExclusiveOr,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// `left ?? right`
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => "??",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
    Convert,
    TypeAs,
    ArrayLength,
    Quote,
}

/// A method being called
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    pub declaring_type: ClrType,
    pub name: String,
    pub is_static: bool,
    pub is_generic: bool,
    pub return_type: ClrType,
}

impl MethodInfo {
    /// An instance method
    pub fn instance(
        declaring_type: ClrType,
        name: impl Into<String>,
        return_type: ClrType,
    ) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            is_static: false,
            is_generic: false,
            return_type,
        }
    }

    /// A static method
    pub fn static_method(
        declaring_type: ClrType,
        name: impl Into<String>,
        return_type: ClrType,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::instance(declaring_type, name, return_type)
        }
    }

    pub fn generic(mut self) -> Self {
        self.is_generic = true;
        self
    }

    /// `Enumerable.Contains<T>(IEnumerable<T>, T)`
    pub fn enumerable_contains() -> Self {
        Self::static_method(
            ClrType::Class(ENUMERABLE_CLASS.to_string()),
            "Contains",
            ClrType::Bool,
        )
        .generic()
    }

    /// `collection.Contains(item)` declared on a list or collection type
    pub fn collection_contains(collection_type: ClrType) -> Self {
        Self::instance(collection_type, "Contains", ClrType::Bool)
    }

    /// Instance `x.Equals(y)`
    pub fn instance_equals(declaring_type: ClrType) -> Self {
        Self::instance(declaring_type, "Equals", ClrType::Bool)
    }

    /// Static `object.Equals(a, b)`
    pub fn static_equals() -> Self {
        Self::static_method(ClrType::Object, "Equals", ClrType::Bool)
    }

    /// `EF.Property<T>(entity, "Name")`
    pub fn property_accessor(return_type: ClrType) -> Self {
        Self::static_method(
            ClrType::Class(PROPERTY_ACCESSOR_CLASS.to_string()),
            "Property",
            return_type,
        )
        .generic()
    }

    pub fn is_enumerable_contains(&self) -> bool {
        self.is_static
            && self.is_generic
            && self.name == "Contains"
            && self.declaring_type == ClrType::Class(ENUMERABLE_CLASS.to_string())
    }

    pub fn is_property_accessor(&self) -> bool {
        self.is_static
            && self.is_generic
            && self.name == "Property"
            && self.declaring_type == ClrType::Class(PROPERTY_ACCESSOR_CLASS.to_string())
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantExpression {
    pub value: Value,
    pub clr_type: ClrType,
}

/// Named query parameter or lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpression {
    pub name: String,
    pub clr_type: ClrType,
}

/// Field or property access; `expression` is `None` for static members
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    pub expression: Option<Box<Expression>>,
    pub member: String,
    pub clr_type: ClrType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallExpression {
    pub object: Option<Box<Expression>>,
    pub method: MethodInfo,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub clr_type: ClrType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub op: UnaryOp,
    pub operand: Box<Expression>,
    pub clr_type: ClrType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub if_true: Box<Expression>,
    pub if_false: Box<Expression>,
    pub clr_type: ClrType,
}

/// Constructor call; `members` names the anonymous-type members bound to
/// each argument and is empty for ordinary constructors
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    pub clr_type: ClrType,
    pub arguments: Vec<Expression>,
    pub members: Vec<String>,
}

/// One `Member = value` assignment inside an object initializer
#[derive(Debug, Clone, PartialEq)]
pub struct MemberAssignment {
    pub member: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberInitExpression {
    pub new_expression: NewExpression,
    pub bindings: Vec<MemberAssignment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArrayExpression {
    pub element_type: ClrType,
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListInitExpression {
    pub new_expression: NewExpression,
    pub initializers: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpression {
    pub parameters: Vec<ParameterExpression>,
    pub body: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationExpression {
    pub expression: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub clr_type: ClrType,
}

/// Placeholder standing for a materialized entity; the value buffer is
/// normally a projection binding into the select statement
#[derive(Debug, Clone, PartialEq)]
pub struct EntityShaperExpression {
    pub entity_type: String,
    pub value_buffer: Box<Expression>,
}

/// Reference to a projection registered on the select statement
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionBindingExpression {
    pub projection_member: ProjectionMember,
    pub clr_type: ClrType,
}

/// A generic, CLR-shaped query expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(ConstantExpression),
    Parameter(ParameterExpression),
    Member(MemberExpression),
    MethodCall(MethodCallExpression),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Conditional(ConditionalExpression),
    New(NewExpression),
    MemberInit(MemberInitExpression),
    NewArray(NewArrayExpression),
    ListInit(ListInitExpression),
    Lambda(LambdaExpression),
    Invocation(InvocationExpression),
    EntityShaper(EntityShaperExpression),
    ProjectionBinding(ProjectionBindingExpression),
    /// Already-translated query IR
    Query(QueryExpression),
}

impl Expression {
    pub fn constant(value: impl Into<Value>, clr_type: ClrType) -> Self {
        Expression::Constant(ConstantExpression {
            value: value.into(),
            clr_type,
        })
    }

    /// Typed `null` literal
    pub fn null(clr_type: ClrType) -> Self {
        Self::constant(Value::Null, clr_type)
    }

    pub fn parameter(name: impl Into<String>, clr_type: ClrType) -> Self {
        Expression::Parameter(ParameterExpression {
            name: name.into(),
            clr_type,
        })
    }

    pub fn member(expression: Expression, member: impl Into<String>, clr_type: ClrType) -> Self {
        Expression::Member(MemberExpression {
            expression: Some(Box::new(expression)),
            member: member.into(),
            clr_type,
        })
    }

    pub fn static_member(member: impl Into<String>, clr_type: ClrType) -> Self {
        Expression::Member(MemberExpression {
            expression: None,
            member: member.into(),
            clr_type,
        })
    }

    pub fn call(object: Expression, method: MethodInfo, arguments: Vec<Expression>) -> Self {
        Expression::MethodCall(MethodCallExpression {
            object: Some(Box::new(object)),
            method,
            arguments,
        })
    }

    pub fn static_call(method: MethodInfo, arguments: Vec<Expression>) -> Self {
        Expression::MethodCall(MethodCallExpression {
            object: None,
            method,
            arguments,
        })
    }

    /// `EF.Property<T>(source, "name")`
    pub fn property(source: Expression, name: &str, clr_type: ClrType) -> Self {
        Self::static_call(
            MethodInfo::property_accessor(clr_type),
            vec![source, Self::constant(name, ClrType::String)],
        )
    }

    /// Binary node; the result type follows the operator
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        let clr_type = if op.is_comparison() || op.is_logical() {
            ClrType::Bool
        } else if op == BinaryOp::Coalesce {
            right.clr_type()
        } else {
            left.clr_type()
        };
        Expression::Binary(BinaryExpression {
            op,
            left: Box::new(left),
            right: Box::new(right),
            clr_type,
        })
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Equal, left, right)
    }

    pub fn not_equal(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::NotEqual, left, right)
    }

    pub fn unary(op: UnaryOp, operand: Expression, clr_type: ClrType) -> Self {
        Expression::Unary(UnaryExpression {
            op,
            operand: Box::new(operand),
            clr_type,
        })
    }

    pub fn not(operand: Expression) -> Self {
        Self::unary(UnaryOp::Not, operand, ClrType::Bool)
    }

    pub fn negate(operand: Expression) -> Self {
        let clr_type = operand.clr_type();
        Self::unary(UnaryOp::Negate, operand, clr_type)
    }

    pub fn convert(operand: Expression, clr_type: ClrType) -> Self {
        Self::unary(UnaryOp::Convert, operand, clr_type)
    }

    pub fn condition(test: Expression, if_true: Expression, if_false: Expression) -> Self {
        let clr_type = if_true.clr_type();
        Expression::Conditional(ConditionalExpression {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            clr_type,
        })
    }

    pub fn new_object(clr_type: ClrType, members: Vec<String>, arguments: Vec<Expression>) -> Self {
        Expression::New(NewExpression {
            clr_type,
            arguments,
            members,
        })
    }

    pub fn lambda(parameters: Vec<ParameterExpression>, body: Expression) -> Self {
        Expression::Lambda(LambdaExpression {
            parameters,
            body: Box::new(body),
        })
    }

    pub fn entity_shaper(entity_type: impl Into<String>, value_buffer: Expression) -> Self {
        Expression::EntityShaper(EntityShaperExpression {
            entity_type: entity_type.into(),
            value_buffer: Box::new(value_buffer),
        })
    }

    pub fn projection_binding(projection_member: ProjectionMember, clr_type: ClrType) -> Self {
        Expression::ProjectionBinding(ProjectionBindingExpression {
            projection_member,
            clr_type,
        })
    }

    /// Static type of the node
    pub fn clr_type(&self) -> ClrType {
        match self {
            Expression::Constant(c) => c.clr_type.clone(),
            Expression::Parameter(p) => p.clr_type.clone(),
            Expression::Member(m) => m.clr_type.clone(),
            Expression::MethodCall(m) => m.method.return_type.clone(),
            Expression::Binary(b) => b.clr_type.clone(),
            Expression::Unary(u) => u.clr_type.clone(),
            Expression::Conditional(c) => c.clr_type.clone(),
            Expression::New(n) => n.clr_type.clone(),
            Expression::MemberInit(m) => m.new_expression.clr_type.clone(),
            Expression::NewArray(a) => ClrType::array(a.element_type.clone()),
            Expression::ListInit(l) => l.new_expression.clr_type.clone(),
            Expression::Lambda(_) => ClrType::Object,
            Expression::Invocation(i) => i.clr_type.clone(),
            Expression::EntityShaper(s) => ClrType::Entity(s.entity_type.clone()),
            Expression::ProjectionBinding(p) => p.clr_type.clone(),
            Expression::Query(q) => q.clr_type(),
        }
    }

    /// Matches `EF.Property<T>(source, "name")`, returning the source and name
    pub fn property_arguments(&self) -> Option<(&Expression, &str)> {
        let Expression::MethodCall(call) = self else {
            return None;
        };
        if !call.method.is_property_accessor() || call.arguments.len() != 2 {
            return None;
        }
        match &call.arguments[1] {
            Expression::Constant(ConstantExpression {
                value: Value::String(name),
                ..
            }) => Some((&call.arguments[0], name.as_str())),
            _ => None,
        }
    }

    /// Replace every free occurrence of the named parameter
    pub fn replace_parameter(&self, name: &str, replacement: &Expression) -> Expression {
        let replace = |e: &Expression| e.replace_parameter(name, replacement);
        let replace_all = |es: &[Expression]| -> Vec<Expression> {
            es.iter()
                .map(|e| e.replace_parameter(name, replacement))
                .collect()
        };
        let replace_new = |n: &NewExpression| NewExpression {
            clr_type: n.clr_type.clone(),
            arguments: replace_all(&n.arguments),
            members: n.members.clone(),
        };

        match self {
            Expression::Parameter(p) if p.name == name => replacement.clone(),
            Expression::Constant(_)
            | Expression::Parameter(_)
            | Expression::ProjectionBinding(_)
            | Expression::Query(_) => self.clone(),
            Expression::Member(m) => Expression::Member(MemberExpression {
                expression: m.expression.as_deref().map(|e| Box::new(replace(e))),
                member: m.member.clone(),
                clr_type: m.clr_type.clone(),
            }),
            Expression::MethodCall(m) => Expression::MethodCall(MethodCallExpression {
                object: m.object.as_deref().map(|e| Box::new(replace(e))),
                method: m.method.clone(),
                arguments: replace_all(&m.arguments),
            }),
            Expression::Binary(b) => Expression::Binary(BinaryExpression {
                op: b.op,
                left: Box::new(replace(&b.left)),
                right: Box::new(replace(&b.right)),
                clr_type: b.clr_type.clone(),
            }),
            Expression::Unary(u) => Expression::Unary(UnaryExpression {
                op: u.op,
                operand: Box::new(replace(&u.operand)),
                clr_type: u.clr_type.clone(),
            }),
            Expression::Conditional(c) => Expression::Conditional(ConditionalExpression {
                test: Box::new(replace(&c.test)),
                if_true: Box::new(replace(&c.if_true)),
                if_false: Box::new(replace(&c.if_false)),
                clr_type: c.clr_type.clone(),
            }),
            Expression::New(n) => Expression::New(replace_new(n)),
            Expression::MemberInit(m) => Expression::MemberInit(MemberInitExpression {
                new_expression: replace_new(&m.new_expression),
                bindings: m
                    .bindings
                    .iter()
                    .map(|b| MemberAssignment {
                        member: b.member.clone(),
                        expression: replace(&b.expression),
                    })
                    .collect(),
            }),
            Expression::NewArray(a) => Expression::NewArray(NewArrayExpression {
                element_type: a.element_type.clone(),
                expressions: replace_all(&a.expressions),
            }),
            Expression::ListInit(l) => Expression::ListInit(ListInitExpression {
                new_expression: replace_new(&l.new_expression),
                initializers: replace_all(&l.initializers),
            }),
            // Shadowed by the lambda's own parameter
            Expression::Lambda(l) if l.parameters.iter().any(|p| p.name == name) => self.clone(),
            Expression::Lambda(l) => Expression::Lambda(LambdaExpression {
                parameters: l.parameters.clone(),
                body: Box::new(replace(&l.body)),
            }),
            Expression::Invocation(i) => Expression::Invocation(InvocationExpression {
                expression: Box::new(replace(&i.expression)),
                arguments: replace_all(&i.arguments),
                clr_type: i.clr_type.clone(),
            }),
            Expression::EntityShaper(s) => Expression::EntityShaper(EntityShaperExpression {
                entity_type: s.entity_type.clone(),
                value_buffer: Box::new(replace(&s.value_buffer)),
            }),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{}", c.value),
            Expression::Parameter(p) => write!(f, "{}", p.name),
            Expression::Member(m) => match &m.expression {
                Some(e) => write!(f, "{}.{}", e, m.member),
                None => write!(f, "{}", m.member),
            },
            Expression::MethodCall(m) => {
                match &m.object {
                    Some(o) => write!(f, "{}.{}(", o, m.method.name)?,
                    None => write!(f, "{}.{}(", m.method.declaring_type, m.method.name)?,
                }
                write_list(f, &m.arguments)?;
                write!(f, ")")
            }
            Expression::Binary(b) => write!(f, "({} {} {})", b.left, b.op.symbol(), b.right),
            Expression::Unary(u) => match u.op {
                UnaryOp::Not => write!(f, "!{}", u.operand),
                UnaryOp::Negate => write!(f, "-{}", u.operand),
                UnaryOp::Convert => write!(f, "Convert({}, {})", u.operand, u.clr_type),
                UnaryOp::TypeAs => write!(f, "({} as {})", u.operand, u.clr_type),
                UnaryOp::ArrayLength => write!(f, "ArrayLength({})", u.operand),
                UnaryOp::Quote => write!(f, "{}", u.operand),
            },
            Expression::Conditional(c) => {
                write!(f, "({} ? {} : {})", c.test, c.if_true, c.if_false)
            }
            Expression::New(n) => {
                write!(f, "new {}(", n.clr_type)?;
                write_list(f, &n.arguments)?;
                write!(f, ")")
            }
            Expression::MemberInit(m) => {
                write!(f, "new {} {{ ", m.new_expression.clr_type)?;
                for (i, b) in m.bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", b.member, b.expression)?;
                }
                write!(f, " }}")
            }
            Expression::NewArray(a) => {
                write!(f, "new {}[] {{ ", a.element_type)?;
                write_list(f, &a.expressions)?;
                write!(f, " }}")
            }
            Expression::ListInit(l) => {
                write!(f, "new {} {{ ", l.new_expression.clr_type)?;
                write_list(f, &l.initializers)?;
                write!(f, " }}")
            }
            Expression::Lambda(l) => {
                let names: Vec<&str> = l.parameters.iter().map(|p| p.name.as_str()).collect();
                write!(f, "({}) => {}", names.join(", "), l.body)
            }
            Expression::Invocation(i) => {
                write!(f, "Invoke({}", i.expression)?;
                for arg in &i.arguments {
                    write!(f, ", {}", arg)?;
                }
                write!(f, ")")
            }
            Expression::EntityShaper(s) => write!(f, "EntityShaper({})", s.entity_type),
            Expression::ProjectionBinding(p) => {
                write!(f, "ProjectionBinding({})", p.projection_member)
            }
            Expression::Query(q) => write!(f, "{}", q),
        }
    }
}
