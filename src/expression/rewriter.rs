//! Expression rewrite visitor.
//!
//! [`rewrite_expression`] walks an [`Expr`] tree with one case per node kind.
//! A node is rebuilt only when at least one of its children changed; otherwise
//! the caller gets back a clone of the original `Arc` (same allocation), so
//! `Arc::ptr_eq` is a cheap "nothing happened" check.
//!
//! # Example
//!
//! ```ignore
//! struct RenameParameter;
//!
//! impl ExpressionRewriter for RenameParameter {
//!     type Error = std::convert::Infallible;
//!
//!     fn post_visit(&mut self, expr: Arc<Expr>) -> Result<Transformed<Arc<Expr>>, Self::Error> {
//!         match expr.as_ref() {
//!             Expr::Parameter(p) if p.name == "x" => Ok(Transformed::Yes(Expr::parameter("y", &p.type_name))),
//!             _ => Ok(Transformed::No(expr)),
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use super::{
    BinaryExpr, ConditionalExpr, Expr, InvokeExpr, LambdaExpr, ListInitExpr, MemberBinding,
    MemberExpr, MemberInitExpr, MethodCallExpr, NewArrayExpr, NewExpr, TypeIsExpr, UnaryExpr,
};
use crate::transformed::Transformed;

pub trait ExpressionRewriter {
    type Error;

    /// Called before a node's children are visited. Returning `Some` replaces
    /// the node and skips its subtree entirely.
    fn pre_visit(&mut self, _expr: &Arc<Expr>) -> Result<Option<Arc<Expr>>, Self::Error> {
        Ok(None)
    }

    /// Called after the children were rewritten, with the (possibly rebuilt) node.
    fn post_visit(&mut self, expr: Arc<Expr>) -> Result<Transformed<Arc<Expr>>, Self::Error> {
        Ok(Transformed::No(expr))
    }
}

pub fn rewrite_expression<R: ExpressionRewriter>(
    expr: &Arc<Expr>,
    rewriter: &mut R,
) -> Result<Transformed<Arc<Expr>>, R::Error> {
    if let Some(replacement) = rewriter.pre_visit(expr)? {
        return Ok(Transformed::Yes(replacement));
    }

    let children = rewrite_children(expr, rewriter)?;
    let changed = children.is_yes();
    match rewriter.post_visit(children.get())? {
        Transformed::No(node) if changed => Ok(Transformed::Yes(node)),
        outcome => Ok(outcome),
    }
}

fn rewrite_children<R: ExpressionRewriter>(
    expr: &Arc<Expr>,
    rewriter: &mut R,
) -> Result<Transformed<Arc<Expr>>, R::Error> {
    let rebuilt = match expr.as_ref() {
        Expr::Constant(_) | Expr::Parameter(_) | Expr::SubQuery(_) => None,

        Expr::MemberAccess(m) => match &m.expression {
            Some(inner) => {
                let inner = rewrite_expression(inner, rewriter)?;
                inner.is_yes().then(|| {
                    Expr::MemberAccess(MemberExpr {
                        expression: Some(inner.get()),
                        member: m.member.clone(),
                    })
                })
            }
            None => None,
        },

        Expr::Call(c) => {
            let object = rewrite_optional(&c.object, rewriter)?;
            let arguments = rewrite_all(&c.arguments, rewriter)?;
            (object.is_yes() || arguments.is_yes()).then(|| {
                Expr::Call(MethodCallExpr {
                    object: object.get(),
                    method: c.method.clone(),
                    arguments: arguments.get(),
                    type_name: c.type_name.clone(),
                })
            })
        }

        Expr::Unary(u) => {
            let operand = rewrite_expression(&u.operand, rewriter)?;
            operand.is_yes().then(|| {
                Expr::Unary(UnaryExpr {
                    operator: u.operator,
                    operand: operand.get(),
                    type_name: u.type_name.clone(),
                })
            })
        }

        Expr::Binary(b) => {
            let left = rewrite_expression(&b.left, rewriter)?;
            let right = rewrite_expression(&b.right, rewriter)?;
            (left.is_yes() || right.is_yes()).then(|| {
                Expr::Binary(BinaryExpr {
                    operator: b.operator,
                    left: left.get(),
                    right: right.get(),
                    type_name: b.type_name.clone(),
                })
            })
        }

        Expr::Lambda(l) => {
            let body = rewrite_expression(&l.body, rewriter)?;
            body.is_yes().then(|| {
                Expr::Lambda(LambdaExpr {
                    parameters: l.parameters.clone(),
                    body: body.get(),
                })
            })
        }

        Expr::New(n) => rewrite_new(n, rewriter)?.map(Expr::New),

        Expr::NewArray(n) => {
            let expressions = rewrite_all(&n.expressions, rewriter)?;
            expressions.is_yes().then(|| {
                Expr::NewArray(NewArrayExpr {
                    element_type: n.element_type.clone(),
                    expressions: expressions.get(),
                })
            })
        }

        Expr::MemberInit(m) => {
            let new_expression = rewrite_new(&m.new_expression, rewriter)?;
            let mut bindings_changed = false;
            let mut bindings = Vec::with_capacity(m.bindings.len());
            for binding in &m.bindings {
                let expression = rewrite_expression(&binding.expression, rewriter)?;
                bindings_changed |= expression.is_yes();
                bindings.push(MemberBinding {
                    member: binding.member.clone(),
                    expression: expression.get(),
                });
            }
            (new_expression.is_some() || bindings_changed).then(|| {
                Expr::MemberInit(MemberInitExpr {
                    new_expression: new_expression.unwrap_or_else(|| m.new_expression.clone()),
                    bindings,
                })
            })
        }

        Expr::ListInit(l) => {
            let new_expression = rewrite_new(&l.new_expression, rewriter)?;
            let initializers = rewrite_all(&l.initializers, rewriter)?;
            (new_expression.is_some() || initializers.is_yes()).then(|| {
                Expr::ListInit(ListInitExpr {
                    new_expression: new_expression.unwrap_or_else(|| l.new_expression.clone()),
                    initializers: initializers.get(),
                })
            })
        }

        Expr::Conditional(c) => {
            let test = rewrite_expression(&c.test, rewriter)?;
            let if_true = rewrite_expression(&c.if_true, rewriter)?;
            let if_false = rewrite_expression(&c.if_false, rewriter)?;
            (test.is_yes() || if_true.is_yes() || if_false.is_yes()).then(|| {
                Expr::Conditional(ConditionalExpr {
                    test: test.get(),
                    if_true: if_true.get(),
                    if_false: if_false.get(),
                })
            })
        }

        Expr::TypeIs(t) => {
            let expression = rewrite_expression(&t.expression, rewriter)?;
            expression.is_yes().then(|| {
                Expr::TypeIs(TypeIsExpr {
                    expression: expression.get(),
                    type_operand: t.type_operand.clone(),
                })
            })
        }

        Expr::Invoke(i) => {
            let expression = rewrite_expression(&i.expression, rewriter)?;
            let arguments = rewrite_all(&i.arguments, rewriter)?;
            (expression.is_yes() || arguments.is_yes()).then(|| {
                Expr::Invoke(InvokeExpr {
                    expression: expression.get(),
                    arguments: arguments.get(),
                })
            })
        }
    };

    Ok(match rebuilt {
        Some(node) => Transformed::Yes(Arc::new(node)),
        None => Transformed::No(Arc::clone(expr)),
    })
}

/// Rewrites the arguments of a constructor; `None` when none of them changed.
fn rewrite_new<R: ExpressionRewriter>(
    new: &NewExpr,
    rewriter: &mut R,
) -> Result<Option<NewExpr>, R::Error> {
    let arguments = rewrite_all(&new.arguments, rewriter)?;
    Ok(arguments.is_yes().then(|| NewExpr {
        type_name: new.type_name.clone(),
        arguments: arguments.get(),
        members: new.members.clone(),
    }))
}

fn rewrite_optional<R: ExpressionRewriter>(
    expr: &Option<Arc<Expr>>,
    rewriter: &mut R,
) -> Result<Transformed<Option<Arc<Expr>>>, R::Error> {
    match expr {
        Some(inner) => Ok(rewrite_expression(inner, rewriter)?.map(Some)),
        None => Ok(Transformed::No(None)),
    }
}

fn rewrite_all<R: ExpressionRewriter>(
    exprs: &[Arc<Expr>],
    rewriter: &mut R,
) -> Result<Transformed<Vec<Arc<Expr>>>, R::Error> {
    let mut changed = false;
    let mut rewritten = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let outcome = rewrite_expression(expr, rewriter)?;
        changed |= outcome.is_yes();
        rewritten.push(outcome.get());
    }
    Ok(if changed {
        Transformed::Yes(rewritten)
    } else {
        Transformed::No(rewritten)
    })
}
