//! Partial evaluation of expression subtrees that do not depend on any
//! lambda parameter.
//!
//! The parser only needs this to decide whether an unrecognized call or other
//! non-operator node is really a query source in disguise (a captured table
//! handle, a conditional between two handles, a converted constant, ...).
//! Folding is conservative: anything it does not know how to compute stays
//! as it is.

use std::{convert::Infallible, sync::Arc};

use super::{
    rewriter::{rewrite_expression, ExpressionRewriter},
    BinaryOperator, ConstantValue, Expr, UnaryOperator,
};
use crate::transformed::Transformed;

/// Folds every constant subtree of `expr`. Returns the original `Arc` when
/// nothing could be folded.
pub fn evaluate_partially(expr: &Arc<Expr>) -> Arc<Expr> {
    match rewrite_expression(expr, &mut ConstantFolder) {
        Ok(outcome) => outcome.get(),
        Err(never) => match never {},
    }
}

struct ConstantFolder;

impl ExpressionRewriter for ConstantFolder {
    type Error = Infallible;

    fn post_visit(&mut self, expr: Arc<Expr>) -> Result<Transformed<Arc<Expr>>, Infallible> {
        let folded = match expr.as_ref() {
            Expr::Unary(u) => u
                .operand
                .as_constant()
                .and_then(|value| fold_unary(u.operator, value)),
            Expr::Binary(b) => match (b.left.as_constant(), b.right.as_constant()) {
                (Some(left), Some(right)) => fold_binary(b.operator, left, right),
                (Some(ConstantValue::Null), None) if b.operator == BinaryOperator::Coalesce => {
                    return Ok(Transformed::Yes(Arc::clone(&b.right)));
                }
                _ => None,
            },
            Expr::Conditional(c) => match c.test.as_constant() {
                Some(ConstantValue::Bool(true)) => {
                    return Ok(Transformed::Yes(Arc::clone(&c.if_true)));
                }
                Some(ConstantValue::Bool(false)) => {
                    return Ok(Transformed::Yes(Arc::clone(&c.if_false)));
                }
                _ => None,
            },
            Expr::MemberAccess(m) => match m.expression.as_deref() {
                Some(Expr::Constant(constant)) => match &constant.value {
                    ConstantValue::Record(fields) => fields.get(&m.member.name).cloned(),
                    _ => None,
                },
                _ => None,
            },
            Expr::NewArray(n) => n
                .expressions
                .iter()
                .map(|e| e.as_constant().cloned())
                .collect::<Option<Vec<_>>>()
                .map(ConstantValue::List),
            _ => None,
        };

        Ok(match folded {
            Some(value) => {
                log::trace!("partial evaluation folded '{}' into '{}'", expr, value);
                Transformed::Yes(Expr::constant(value))
            }
            None => Transformed::No(expr),
        })
    }
}

fn fold_unary(operator: UnaryOperator, value: &ConstantValue) -> Option<ConstantValue> {
    match (operator, value) {
        (UnaryOperator::Convert | UnaryOperator::Quote | UnaryOperator::TypeAs, v) => {
            Some(v.clone())
        }
        (UnaryOperator::Negate, ConstantValue::Int(i)) => i.checked_neg().map(ConstantValue::Int),
        (UnaryOperator::Negate, ConstantValue::Float(x)) => Some(ConstantValue::Float(-x)),
        (UnaryOperator::Not, ConstantValue::Bool(b)) => Some(ConstantValue::Bool(!b)),
        (UnaryOperator::ArrayLength, ConstantValue::List(items)) => {
            i64::try_from(items.len()).ok().map(ConstantValue::Int)
        }
        _ => None,
    }
}

fn fold_binary(
    operator: BinaryOperator,
    left: &ConstantValue,
    right: &ConstantValue,
) -> Option<ConstantValue> {
    use ConstantValue::{Bool, Float, Int, List, Null, String as Str};

    match (operator, left, right) {
        (BinaryOperator::Coalesce, Null, r) => Some(r.clone()),
        (BinaryOperator::Coalesce, l, _) => Some(l.clone()),

        (BinaryOperator::Equal, l, r) => Some(Bool(l == r)),
        (BinaryOperator::NotEqual, l, r) => Some(Bool(l != r)),

        (BinaryOperator::AndAlso, Bool(l), Bool(r)) => Some(Bool(*l && *r)),
        (BinaryOperator::OrElse, Bool(l), Bool(r)) => Some(Bool(*l || *r)),

        (BinaryOperator::Add, Str(l), Str(r)) => Some(Str(format!("{}{}", l, r))),

        (BinaryOperator::ArrayIndex, List(items), Int(i)) => {
            usize::try_from(*i).ok().and_then(|i| items.get(i)).cloned()
        }

        (op, Int(l), Int(r)) => fold_int(op, *l, *r),
        (op, Float(l), Float(r)) => fold_float(op, *l, *r),
        (op, Int(l), Float(r)) => fold_float(op, *l as f64, *r),
        (op, Float(l), Int(r)) => fold_float(op, *l, *r as f64),

        _ => None,
    }
}

fn fold_int(operator: BinaryOperator, l: i64, r: i64) -> Option<ConstantValue> {
    use ConstantValue::{Bool, Int};

    match operator {
        BinaryOperator::Add => l.checked_add(r).map(Int),
        BinaryOperator::Subtract => l.checked_sub(r).map(Int),
        BinaryOperator::Multiply => l.checked_mul(r).map(Int),
        BinaryOperator::Divide => l.checked_div(r).map(Int),
        BinaryOperator::Modulo => l.checked_rem(r).map(Int),
        BinaryOperator::LessThan => Some(Bool(l < r)),
        BinaryOperator::LessThanOrEqual => Some(Bool(l <= r)),
        BinaryOperator::GreaterThan => Some(Bool(l > r)),
        BinaryOperator::GreaterThanOrEqual => Some(Bool(l >= r)),
        _ => None,
    }
}

fn fold_float(operator: BinaryOperator, l: f64, r: f64) -> Option<ConstantValue> {
    use ConstantValue::{Bool, Float};

    match operator {
        BinaryOperator::Add => Some(Float(l + r)),
        BinaryOperator::Subtract => Some(Float(l - r)),
        BinaryOperator::Multiply => Some(Float(l * r)),
        BinaryOperator::Divide => Some(Float(l / r)),
        BinaryOperator::LessThan => Some(Bool(l < r)),
        BinaryOperator::LessThanOrEqual => Some(Bool(l <= r)),
        BinaryOperator::GreaterThan => Some(Bool(l > r)),
        BinaryOperator::GreaterThanOrEqual => Some(Bool(l >= r)),
        _ => None,
    }
}
