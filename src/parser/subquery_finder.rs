use std::sync::Arc;

use super::{errors::ParseError, operators::is_operator_chain, ParseSession};
use crate::{
    expression::{
        rewriter::{rewrite_expression, ExpressionRewriter},
        Expr, SubQueryExpr,
    },
    query_model::QueryModel,
};

/// Replaces every operator chain embedded in a clause expression with an
/// [`Expr::SubQuery`] node holding its parsed model. The models are also
/// collected so the enclosing model can link them to itself.
pub struct SubQueryFinder<'a, 'q> {
    session: &'a mut ParseSession<'q>,
    found: &'a mut Vec<Arc<QueryModel>>,
}

impl<'a, 'q> SubQueryFinder<'a, 'q> {
    pub fn new(session: &'a mut ParseSession<'q>, found: &'a mut Vec<Arc<QueryModel>>) -> Self {
        SubQueryFinder { session, found }
    }

    /// `expression` with its sub-queries replaced; the same `Arc` if it has none.
    pub fn replace_sub_queries(&mut self, expression: &Arc<Expr>) -> Result<Arc<Expr>, ParseError> {
        Ok(rewrite_expression(expression, self)?.get())
    }
}

impl ExpressionRewriter for SubQueryFinder<'_, '_> {
    type Error = ParseError;

    fn pre_visit(&mut self, expr: &Arc<Expr>) -> Result<Option<Arc<Expr>>, ParseError> {
        if !is_operator_chain(expr) {
            return Ok(None);
        }
        log::debug!("found sub-query '{}'", expr);
        let model = self.session.parse_model(expr)?;
        self.found.push(Arc::clone(&model));
        Ok(Some(Arc::new(Expr::SubQuery(SubQueryExpr { model }))))
    }
}
