use std::sync::Arc;

use super::{
    collector::{BodyStep, FromStep, LetStep, OrderStep, ParseResultCollector},
    errors::{ParseError, ParseResult},
    operators::is_operator_chain,
    subquery_finder::SubQueryFinder,
    ParseSession,
};
use crate::{
    expression::{strip_quotes, Expr, ParameterExpr},
    query_model::{
        BodyClause, FromClause, FromClauseKind, OrderByClause, Ordering, QueryModel,
        SelectClause, WhereClause,
    },
};

/// Second phase: assembles a [`QueryModel`] from collected steps.
///
/// Additional-from and let steps each consume the next collected projection;
/// the select clause takes the last one. Embedded operator chains in clause
/// expressions become sub-queries whose parent link is set once the model
/// exists.
pub struct QueryModelBuilder<'s, 'q> {
    session: &'s mut ParseSession<'q>,
    sub_queries: Vec<Arc<QueryModel>>,
}

impl<'s, 'q> QueryModelBuilder<'s, 'q> {
    pub fn new(session: &'s mut ParseSession<'q>) -> Self {
        QueryModelBuilder {
            session,
            sub_queries: Vec::new(),
        }
    }

    pub fn build(
        mut self,
        expression: &Arc<Expr>,
        collector: ParseResultCollector,
    ) -> ParseResult<Arc<QueryModel>> {
        let (steps, projections, distinct, result_modifiers) = collector.into_parts();
        let mut steps = steps.into_iter();

        let main_from = match steps.next() {
            Some(BodyStep::From(step)) => Arc::new(FromClause::new(
                step.identifier,
                FromClauseKind::Main {
                    source: step.source,
                },
            )),
            _ => {
                return Err(ParseError::MissingMainFrom {
                    expression: Arc::clone(expression),
                    query: Arc::clone(self.session.query()),
                })
            }
        };

        let mut projection_cursor = projections.iter();
        let mut body_clauses: Vec<BodyClause> = Vec::new();
        let mut current_order_by: Option<usize> = None;

        for step in steps {
            match step {
                BodyStep::From(step) => {
                    let projection =
                        self.next_projection(&mut projection_cursor, "from", &step.source)?;
                    let clause = self.additional_from(step, projection)?;
                    body_clauses.push(BodyClause::From(clause));
                }
                BodyStep::Where(step) => {
                    let predicate = self.replace_sub_queries(&step.predicate)?;
                    body_clauses.push(BodyClause::Where(WhereClause { predicate }));
                }
                BodyStep::Order(step) => {
                    self.add_ordering(step, &mut body_clauses, &mut current_order_by)?;
                }
                BodyStep::Let(step) => {
                    let projection =
                        self.next_projection(&mut projection_cursor, "let", &step.projection)?;
                    let clause = self.let_clause(step, projection)?;
                    body_clauses.push(BodyClause::From(clause));
                }
            }
            if let Some(clause) = body_clauses.last() {
                log::debug!("built {} clause: {}", clause.kind_name(), clause);
            }
        }

        let projection = match projections.last() {
            Some(Some(projection)) => Some(self.replace_sub_queries(projection)?),
            Some(None) => None,
            None => {
                return Err(ParseError::MissingSelectProjection {
                    expression: Arc::clone(expression),
                    query: Arc::clone(self.session.query()),
                })
            }
        };
        let select_clause = SelectClause {
            projection,
            distinct,
            result_modifiers,
        };

        let model = Arc::new(QueryModel::new(
            main_from,
            body_clauses,
            select_clause,
            Arc::clone(expression),
            self.sub_queries,
        ));
        for child in model.child_queries() {
            if !child.set_parent_query(&model) {
                log::warn!("sub-query '{}' already has a parent query", child.expression);
            }
        }
        Ok(model)
    }

    fn next_projection<'p>(
        &self,
        cursor: &mut std::slice::Iter<'p, Option<Arc<Expr>>>,
        clause: &str,
        expression: &Arc<Expr>,
    ) -> ParseResult<&'p Option<Arc<Expr>>> {
        cursor.next().ok_or_else(|| ParseError::MissingProjection {
            clause: clause.to_string(),
            expression: Arc::clone(expression),
            query: Arc::clone(self.session.query()),
        })
    }

    fn replace_sub_queries(&mut self, expression: &Arc<Expr>) -> ParseResult<Arc<Expr>> {
        SubQueryFinder::new(&mut *self.session, &mut self.sub_queries).replace_sub_queries(expression)
    }

    /// From step after the first: a sub-query source when the collection
    /// selector's body is itself an operator chain, an additional from otherwise.
    fn additional_from(
        &mut self,
        step: FromStep,
        projection: &Option<Arc<Expr>>,
    ) -> ParseResult<Arc<FromClause>> {
        let body = match strip_quotes(&step.source).as_ref() {
            Expr::Lambda(lambda) => Some(Arc::clone(&lambda.body)),
            _ => None,
        };

        let projection = match projection {
            Some(projection) => Some(self.replace_sub_queries(projection)?),
            None => None,
        };
        let kind = match body {
            Some(body) if is_operator_chain(&body) => FromClauseKind::SubQuery {
                query_model: self.session.parse_model(&body)?,
                projection,
            },
            _ => FromClauseKind::Additional {
                from_expression: self.replace_sub_queries(&step.source)?,
                projection,
            },
        };
        Ok(Arc::new(FromClause::new(step.identifier, kind)))
    }

    /// `Select(src, x => new { x, y = expr })` nested in a chain is `let y = expr`.
    fn let_clause(
        &mut self,
        step: LetStep,
        projection: &Option<Arc<Expr>>,
    ) -> ParseResult<Arc<FromClause>> {
        let unsupported = || ParseError::UnsupportedLetProjection {
            expression: Arc::clone(&step.projection),
            query: Arc::clone(self.session.query()),
        };

        let (identifier, value) = match strip_quotes(&step.projection).as_ref() {
            Expr::Lambda(lambda) => match lambda.body.as_ref() {
                Expr::New(new)
                    if !new.members.is_empty() && new.members.len() == new.arguments.len() =>
                {
                    let member = &new.members[new.members.len() - 1];
                    let argument = &new.arguments[new.arguments.len() - 1];
                    (
                        ParameterExpr::new(member.name.clone(), member.member_type.clone()),
                        Arc::clone(argument),
                    )
                }
                _ => return Err(unsupported()),
            },
            _ => return Err(unsupported()),
        };

        let expression = self.replace_sub_queries(&value)?;
        let projection = projection
            .clone()
            .unwrap_or_else(|| Arc::clone(&step.projection));
        Ok(Arc::new(FromClause::new(
            identifier,
            FromClauseKind::Let {
                expression,
                projection,
            },
        )))
    }

    fn add_ordering(
        &mut self,
        step: OrderStep,
        body_clauses: &mut Vec<BodyClause>,
        current_order_by: &mut Option<usize>,
    ) -> ParseResult<()> {
        let ordering = Ordering {
            expression: self.replace_sub_queries(&step.expression)?,
            direction: step.direction,
        };

        if step.first_order_by {
            *current_order_by = Some(body_clauses.len());
            body_clauses.push(BodyClause::OrderBy(OrderByClause {
                orderings: vec![ordering],
            }));
            return Ok(());
        }

        match current_order_by.and_then(|index| body_clauses.get_mut(index)) {
            Some(BodyClause::OrderBy(clause)) => {
                clause.orderings.push(ordering);
                Ok(())
            }
            _ => Err(ParseError::ThenByWithoutOrderBy {
                expression: step.expression,
                query: Arc::clone(self.session.query()),
            }),
        }
    }
}
