use std::{convert::Infallible, sync::Arc};

use crate::{
    expression::{
        rewriter::{rewrite_expression, ExpressionRewriter},
        Expr,
    },
    query_model::{FromClause, QueryModel},
    resolver::{
        clause_resolver::{member_chain, ClauseFieldResolver},
        errors::{FieldAccessResolveError, ResolveError},
        join_context::JoinedTableContext,
        policy::FieldAccessPolicy,
        types::FieldDescriptor,
    },
    schema::SchemaProvider,
};

/// Resolves a field reference against a whole query model: finds the from
/// clause owning the reference, in this model or an enclosing one, and hands
/// the reference to a [`ClauseFieldResolver`].
pub struct QueryModelFieldResolver<'a> {
    provider: &'a dyn SchemaProvider,
}

impl<'a> QueryModelFieldResolver<'a> {
    pub fn new(provider: &'a dyn SchemaProvider) -> Self {
        QueryModelFieldResolver { provider }
    }

    pub fn resolve_field(
        &self,
        model: &QueryModel,
        expr: &Arc<Expr>,
        context: &mut JoinedTableContext,
        policy: &dyn FieldAccessPolicy,
    ) -> Result<FieldDescriptor, ResolveError> {
        if let Some((clause, reference)) = find_owner(model, expr)? {
            return self.resolve_in_clause(&clause, &reference, context, policy);
        }

        let mut enclosing = model.parent_query();
        while let Some(parent) = enclosing {
            if let Some((clause, reference)) = find_owner(&parent, expr)? {
                log::debug!("'{}' resolved in an enclosing query", expr);
                return self.resolve_in_clause(&clause, &reference, context, policy);
            }
            enclosing = parent.parent_query();
        }

        Err(FieldAccessResolveError::NoFromClauseIdentifier {
            expression: expr.to_string(),
        }
        .into())
    }

    fn resolve_in_clause(
        &self,
        clause: &FromClause,
        reference: &Arc<Expr>,
        context: &mut JoinedTableContext,
        policy: &dyn FieldAccessPolicy,
    ) -> Result<FieldDescriptor, ResolveError> {
        ClauseFieldResolver::new(self.provider)
            .resolve_field(clause, reference, context, policy)
            .map_err(|e| match e {
                ResolveError::FieldAccess(FieldAccessResolveError::IdentifierMismatch { .. }) => {
                    ResolveError::InternalConsistency(e.to_string())
                }
                other => other,
            })
    }
}

/// The clause of `model` owning `expr`, along with the reference rewritten to
/// use that clause's identifier. Transparent identifiers (`t.s.First` where
/// `t` bundles earlier range variables) are unwrapped one level at a time.
fn find_owner(
    model: &QueryModel,
    expr: &Arc<Expr>,
) -> Result<Option<(Arc<FromClause>, Arc<Expr>)>, ResolveError> {
    let mut candidate = Arc::clone(expr);
    loop {
        let (root, members) = member_chain(&candidate)?;
        if let Some(clause) = model.find_from_clause(root) {
            return Ok(Some((Arc::clone(clause), candidate)));
        }
        if members.is_empty() {
            return Ok(None);
        }
        let unwrapped = unwrap_transparent_identifier(&candidate);
        log::trace!("unwrapped '{}' to '{}'", candidate, unwrapped);
        candidate = unwrapped;
    }
}

/// Replaces the innermost `param.member` with a parameter named after the
/// member: `t.s.First` becomes `s.First`.
fn unwrap_transparent_identifier(expr: &Arc<Expr>) -> Arc<Expr> {
    match rewrite_expression(expr, &mut TransparentIdentifierUnwrapper) {
        Ok(outcome) => outcome.get(),
        Err(never) => match never {},
    }
}

struct TransparentIdentifierUnwrapper;

impl ExpressionRewriter for TransparentIdentifierUnwrapper {
    type Error = Infallible;

    fn pre_visit(&mut self, expr: &Arc<Expr>) -> Result<Option<Arc<Expr>>, Infallible> {
        Ok(match expr.as_ref() {
            Expr::MemberAccess(access) => match access.expression.as_deref() {
                Some(Expr::Parameter(_)) => Some(Expr::parameter(
                    &access.member.name,
                    &access.member.member_type,
                )),
                _ => None,
            },
            _ => None,
        })
    }
}
