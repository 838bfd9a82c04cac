//! Expression tree for query operator chains.
//!
//! [`Expr`] is the closed node set the parser consumes: constants, parameters,
//! member accesses, method calls, unary/binary operators, lambdas, object and
//! collection construction, conditionals, type tests and invocations. The
//! builder adds one more node, [`Expr::SubQuery`], when it replaces an embedded
//! operator chain with its parsed [`QueryModel`].
//!
//! Nodes are immutable and shared through `Arc`. Rewrites go through
//! [`rewriter::rewrite_expression`], which hands back the very same `Arc` for
//! every subtree it did not change.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::query_model::QueryModel;

pub mod builders;
pub mod partial_evaluation;
pub mod rewriter;

/// A field or property of a type, as seen from an expression.
///
/// Two members are the same member when they are declared on the same type
/// under the same name; `member_type` only describes the value they produce.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub declaring_type: String,
    pub name: String,
    pub member_type: String,
}

impl MemberInfo {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        member_type: impl Into<String>,
    ) -> Self {
        MemberInfo {
            declaring_type: declaring_type.into(),
            name: name.into(),
            member_type: member_type.into(),
        }
    }
}

impl PartialEq for MemberInfo {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type && self.name == other.name
    }
}

impl Hash for MemberInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaring_type.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// A queryable data source captured as a constant (e.g. a table handle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryableSource {
    pub name: String,
    pub element_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConstantValue>),
    /// Captured variables of a closure, keyed by field name.
    Record(BTreeMap<String, ConstantValue>),
    Queryable(QueryableSource),
}

impl ConstantValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConstantValue::Null)
    }

    pub fn type_name(&self) -> String {
        match self {
            ConstantValue::Null => "Object".to_string(),
            ConstantValue::Bool(_) => "Boolean".to_string(),
            ConstantValue::Int(_) => "Int32".to_string(),
            ConstantValue::Float(_) => "Double".to_string(),
            ConstantValue::String(_) => "String".to_string(),
            ConstantValue::List(_) => "Object[]".to_string(),
            ConstantValue::Record(_) => "Closure".to_string(),
            ConstantValue::Queryable(source) => queryable_type(&source.element_type),
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => write!(f, "null"),
            ConstantValue::Bool(b) => write!(f, "{}", b),
            ConstantValue::Int(i) => write!(f, "{}", i),
            ConstantValue::Float(x) => write!(f, "{}", x),
            ConstantValue::String(s) => write!(f, "\"{}\"", s),
            ConstantValue::List(items) => {
                write!(f, "[")?;
                write_separated(f, items)?;
                write!(f, "]")
            }
            ConstantValue::Record(_) => write!(f, "value(closure)"),
            ConstantValue::Queryable(source) => write!(f, "{}", source.name),
        }
    }
}

/// `IQueryable<T>` spelling used for the result type of operator calls.
pub fn queryable_type(element_type: &str) -> String {
    format!("IQueryable<{}>", element_type)
}

/// Extracts `T` from `IQueryable<T>`, `IEnumerable<T>` and similar
/// single-argument generic sequence types.
pub fn element_type_of(type_name: &str) -> Option<&str> {
    let start = type_name.find('<')?;
    let inner = type_name.get(start + 1..type_name.len().checked_sub(1)?)?;
    if type_name.ends_with('>') && !inner.is_empty() {
        Some(inner)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterExpr {
    pub name: String,
    pub type_name: String,
}

impl ParameterExpr {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        ParameterExpr {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantExpr {
    pub value: ConstantValue,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpr {
    /// `None` for static members.
    pub expression: Option<Arc<Expr>>,
    pub member: MemberInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallExpr {
    /// `None` for static methods (query operators are static extension calls).
    pub object: Option<Arc<Expr>>,
    pub method: String,
    pub arguments: Vec<Arc<Expr>>,
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Convert,
    Quote,
    Negate,
    Not,
    ArrayLength,
    TypeAs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operand: Arc<Expr>,
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAlso,
    OrElse,
    Coalesce,
    ArrayIndex,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::AndAlso => "&&",
            BinaryOperator::OrElse => "||",
            BinaryOperator::Coalesce => "??",
            BinaryOperator::ArrayIndex => "[]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub operator: BinaryOperator,
    pub left: Arc<Expr>,
    pub right: Arc<Expr>,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub parameters: Vec<ParameterExpr>,
    pub body: Arc<Expr>,
}

/// Object construction. Anonymous types list the member each argument
/// initializes in `members`; ordinary constructors leave it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpr {
    pub type_name: String,
    pub arguments: Vec<Arc<Expr>>,
    #[serde(default)]
    pub members: Vec<MemberInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArrayExpr {
    pub element_type: String,
    pub expressions: Vec<Arc<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBinding {
    pub member: MemberInfo,
    pub expression: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInitExpr {
    pub new_expression: NewExpr,
    pub bindings: Vec<MemberBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInitExpr {
    pub new_expression: NewExpr,
    pub initializers: Vec<Arc<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpr {
    pub test: Arc<Expr>,
    pub if_true: Arc<Expr>,
    pub if_false: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeIsExpr {
    pub expression: Arc<Expr>,
    pub type_operand: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeExpr {
    pub expression: Arc<Expr>,
    pub arguments: Vec<Arc<Expr>>,
}

/// A nested query that was embedded in a clause expression.
///
/// Equality is identity of the model, not structure.
#[derive(Debug, Clone)]
pub struct SubQueryExpr {
    pub model: Arc<QueryModel>,
}

impl PartialEq for SubQueryExpr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.model, &other.model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Constant(ConstantExpr),
    Parameter(ParameterExpr),
    MemberAccess(MemberExpr),
    Call(MethodCallExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Lambda(LambdaExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    MemberInit(MemberInitExpr),
    ListInit(ListInitExpr),
    Conditional(ConditionalExpr),
    TypeIs(TypeIsExpr),
    Invoke(InvokeExpr),
    #[serde(skip)]
    SubQuery(SubQueryExpr),
}

impl Expr {
    /// Static type of the value this node produces.
    pub fn type_name(&self) -> String {
        match self {
            Expr::Constant(c) => c.type_name.clone(),
            Expr::Parameter(p) => p.type_name.clone(),
            Expr::MemberAccess(m) => m.member.member_type.clone(),
            Expr::Call(c) => c.type_name.clone(),
            Expr::Unary(u) => u.type_name.clone(),
            Expr::Binary(b) => b.type_name.clone(),
            Expr::Lambda(l) => format!("Func<{}>", l.body.type_name()),
            Expr::New(n) => n.type_name.clone(),
            Expr::NewArray(n) => format!("{}[]", n.element_type),
            Expr::MemberInit(m) => m.new_expression.type_name.clone(),
            Expr::ListInit(l) => l.new_expression.type_name.clone(),
            Expr::Conditional(c) => c.if_true.type_name(),
            Expr::TypeIs(_) => "Boolean".to_string(),
            Expr::Invoke(i) => match i.expression.as_ref() {
                Expr::Lambda(l) => l.body.type_name(),
                _ => "Object".to_string(),
            },
            Expr::SubQuery(s) => queryable_type(&s.model.result_type()),
        }
    }

    /// Node kind, as used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "Constant",
            Expr::Parameter(_) => "Parameter",
            Expr::MemberAccess(_) => "MemberAccess",
            Expr::Call(_) => "Call",
            Expr::Unary(_) => "Unary",
            Expr::Binary(_) => "Binary",
            Expr::Lambda(_) => "Lambda",
            Expr::New(_) => "New",
            Expr::NewArray(_) => "NewArray",
            Expr::MemberInit(_) => "MemberInit",
            Expr::ListInit(_) => "ListInit",
            Expr::Conditional(_) => "Conditional",
            Expr::TypeIs(_) => "TypeIs",
            Expr::Invoke(_) => "Invoke",
            Expr::SubQuery(_) => "SubQuery",
        }
    }

    pub fn as_lambda(&self) -> Option<&LambdaExpr> {
        match self {
            Expr::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterExpr> {
        match self {
            Expr::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match self {
            Expr::Constant(constant) => Some(&constant.value),
            _ => None,
        }
    }
}

/// Strips `Quote` wrappers, which the operator calls put around their lambdas.
pub fn strip_quotes(expr: &Arc<Expr>) -> &Arc<Expr> {
    let mut current = expr;
    while let Expr::Unary(UnaryExpr {
        operator: UnaryOperator::Quote,
        operand,
        ..
    }) = current.as_ref()
    {
        current = operand;
    }
    current
}

fn write_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(c) => write!(f, "{}", c.value),
            Expr::Parameter(p) => write!(f, "{}", p.name),
            Expr::MemberAccess(m) => match &m.expression {
                Some(inner) => write!(f, "{}.{}", inner, m.member.name),
                None => write!(f, "{}", m.member),
            },
            Expr::Call(c) => {
                if let Some(object) = &c.object {
                    write!(f, "{}.", object)?;
                }
                write!(f, "{}(", c.method)?;
                write_separated(f, &c.arguments)?;
                write!(f, ")")
            }
            Expr::Unary(u) => match u.operator {
                UnaryOperator::Quote => write!(f, "{}", u.operand),
                UnaryOperator::Convert => write!(f, "Convert({})", u.operand),
                UnaryOperator::Negate => write!(f, "-{}", u.operand),
                UnaryOperator::Not => write!(f, "Not({})", u.operand),
                UnaryOperator::ArrayLength => write!(f, "ArrayLength({})", u.operand),
                UnaryOperator::TypeAs => write!(f, "({} As {})", u.operand, u.type_name),
            },
            Expr::Binary(b) => match b.operator {
                BinaryOperator::ArrayIndex => write!(f, "{}[{}]", b.left, b.right),
                op => write!(f, "({} {} {})", b.left, op.symbol(), b.right),
            },
            Expr::Lambda(l) => {
                if l.parameters.len() == 1 {
                    write!(f, "{}", l.parameters[0].name)?;
                } else {
                    let names: Vec<&str> = l.parameters.iter().map(|p| p.name.as_str()).collect();
                    write!(f, "({})", names.join(", "))?;
                }
                write!(f, " => {}", l.body)
            }
            Expr::New(n) => fmt_new(f, n),
            Expr::NewArray(n) => {
                write!(f, "new {}[] {{", n.element_type)?;
                write_separated(f, &n.expressions)?;
                write!(f, "}}")
            }
            Expr::MemberInit(m) => {
                fmt_new(f, &m.new_expression)?;
                write!(f, " {{")?;
                for (i, binding) in m.bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", binding.member.name, binding.expression)?;
                }
                write!(f, "}}")
            }
            Expr::ListInit(l) => {
                fmt_new(f, &l.new_expression)?;
                write!(f, " {{")?;
                write_separated(f, &l.initializers)?;
                write!(f, "}}")
            }
            Expr::Conditional(c) => write!(f, "IIF({}, {}, {})", c.test, c.if_true, c.if_false),
            Expr::TypeIs(t) => write!(f, "({} Is {})", t.expression, t.type_operand),
            Expr::Invoke(i) => {
                write!(f, "Invoke({}", i.expression)?;
                for argument in &i.arguments {
                    write!(f, ", {}", argument)?;
                }
                write!(f, ")")
            }
            Expr::SubQuery(s) => write!(f, "{{{}}}", s.model),
        }
    }
}

fn fmt_new(f: &mut fmt::Formatter<'_>, n: &NewExpr) -> fmt::Result {
    write!(f, "new {}(", n.type_name)?;
    for (i, argument) in n.arguments.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match n.members.get(i) {
            Some(member) => write!(f, "{} = {}", member.name, argument)?,
            None => write!(f, "{}", argument)?,
        }
    }
    write!(f, ")")
}
