//! The structured query model produced by the parser.
//!
//! A [`QueryModel`] mirrors a query comprehension: one main from clause, an
//! ordered list of body clauses (additional froms, sub-query froms, lets,
//! where and order-by clauses) and a select clause. Nested queries found
//! inside clause expressions hang off their enclosing model and point back to
//! it through a weak parent link.

use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::expression::{strip_quotes, Expr, ParameterExpr};

pub mod from_clause;

pub use from_clause::{FromClause, FromClauseKind, Identifier};

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Single-parameter lambda.
    pub predicate: Arc<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingDirection::Asc => write!(f, "asc"),
            OrderingDirection::Desc => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    /// Key selector lambda.
    pub expression: Arc<Expr>,
    pub direction: OrderingDirection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderByClause {
    pub orderings: Vec<Ordering>,
}

#[derive(Debug, Clone)]
pub enum BodyClause {
    /// Additional, sub-query or let clause; see [`FromClause::kind`].
    From(Arc<FromClause>),
    Where(WhereClause),
    OrderBy(OrderByClause),
}

impl BodyClause {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BodyClause::From(from) => from.kind_name(),
            BodyClause::Where(_) => "Where",
            BodyClause::OrderBy(_) => "OrderBy",
        }
    }

    pub fn as_from_clause(&self) -> Option<&Arc<FromClause>> {
        match self {
            BodyClause::From(from) => Some(from),
            _ => None,
        }
    }
}

/// An operator applied to the query result, e.g. `Count()` or `Take(3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultModifier {
    pub method: String,
    /// Arguments after the source.
    pub arguments: Vec<Arc<Expr>>,
}

impl fmt::Display for ResultModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", argument)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectClause {
    /// Selector lambda, or `None` to select the range variable in scope.
    pub projection: Option<Arc<Expr>>,
    pub distinct: bool,
    /// Innermost first.
    pub result_modifiers: Vec<ResultModifier>,
}

#[derive(Debug)]
pub struct QueryModel {
    pub main_from_clause: Arc<FromClause>,
    pub body_clauses: Vec<BodyClause>,
    pub select_clause: SelectClause,
    /// The operator chain this model was parsed from.
    pub expression: Arc<Expr>,
    sub_queries: Vec<Arc<QueryModel>>,
    parent: OnceLock<Weak<QueryModel>>,
}

impl QueryModel {
    pub fn new(
        main_from_clause: Arc<FromClause>,
        body_clauses: Vec<BodyClause>,
        select_clause: SelectClause,
        expression: Arc<Expr>,
        sub_queries: Vec<Arc<QueryModel>>,
    ) -> Self {
        QueryModel {
            main_from_clause,
            body_clauses,
            select_clause,
            expression,
            sub_queries,
            parent: OnceLock::new(),
        }
    }

    /// Enclosing query, if this model is a sub-query and the parent is still alive.
    pub fn parent_query(&self) -> Option<Arc<QueryModel>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// Links this model to its enclosing query. The link can only be set once.
    pub(crate) fn set_parent_query(&self, parent: &Arc<QueryModel>) -> bool {
        self.parent.set(Arc::downgrade(parent)).is_ok()
    }

    /// Direct sub-queries, in the order the parser found them.
    pub fn sub_queries(&self) -> &[Arc<QueryModel>] {
        &self.sub_queries
    }

    /// Main from clause followed by every from-like body clause, in order.
    pub fn from_clauses(&self) -> impl Iterator<Item = &Arc<FromClause>> {
        std::iter::once(&self.main_from_clause)
            .chain(self.body_clauses.iter().filter_map(BodyClause::as_from_clause))
    }

    /// The clause introducing `reference` (matched by name and type) in this model only.
    pub fn find_from_clause(&self, reference: &ParameterExpr) -> Option<&Arc<FromClause>> {
        self.from_clauses()
            .find(|clause| clause.is_identified_by(reference))
    }

    /// Identifier names of every from clause in this model and all nested sub-queries.
    pub fn identifier_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .from_clauses()
            .map(|clause| clause.identifier().name.clone())
            .collect();
        for sub_query in self.all_nested_models() {
            names.extend(
                sub_query
                    .from_clauses()
                    .map(|clause| clause.identifier().name.clone()),
            );
        }
        names
    }

    /// Sub-queries at any depth: those found in clause expressions and those
    /// used as from-clause sources.
    pub fn all_nested_models(&self) -> Vec<Arc<QueryModel>> {
        let mut found = Vec::new();
        let mut pending: Vec<Arc<QueryModel>> = self.child_queries();
        while let Some(model) = pending.pop() {
            pending.extend(model.child_queries());
            found.push(model);
        }
        found
    }

    /// Sub-queries nested directly in this model, including from-clause sources.
    pub fn child_queries(&self) -> Vec<Arc<QueryModel>> {
        let mut children: Vec<Arc<QueryModel>> = self.sub_queries.clone();
        for clause in self.from_clauses() {
            if let Some(model) = clause.sub_query() {
                if !children.iter().any(|c| Arc::ptr_eq(c, model)) {
                    children.push(Arc::clone(model));
                }
            }
        }
        children
    }

    /// Element type of the query result, before result modifiers.
    pub fn result_type(&self) -> String {
        match &self.select_clause.projection {
            Some(projection) => match strip_quotes(projection).as_ref() {
                Expr::Lambda(lambda) => lambda.body.type_name(),
                other => other.type_name(),
            },
            None => self
                .from_clauses()
                .filter(|clause| !matches!(clause.kind(), FromClauseKind::Let { .. }))
                .last()
                .map(|clause| clause.identifier().type_name.clone())
                .unwrap_or_else(|| self.main_from_clause.identifier().type_name.clone()),
        }
    }
}

fn lambda_body(expr: &Arc<Expr>) -> &Arc<Expr> {
    match strip_quotes(expr).as_ref() {
        Expr::Lambda(lambda) => &lambda.body,
        _ => expr,
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.identifier().name;
        match self.kind() {
            FromClauseKind::Main { source } => write!(f, "from {} in {}", name, source),
            FromClauseKind::Additional {
                from_expression, ..
            } => write!(f, "from {} in {}", name, lambda_body(from_expression)),
            FromClauseKind::SubQuery { query_model, .. } => {
                write!(f, "from {} in ({})", name, query_model)
            }
            FromClauseKind::Let { expression, .. } => write!(f, "let {} = {}", name, expression),
        }
    }
}

impl fmt::Display for BodyClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyClause::From(from) => write!(f, "{}", from),
            BodyClause::Where(w) => write!(f, "where {}", lambda_body(&w.predicate)),
            BodyClause::OrderBy(o) => {
                write!(f, "orderby ")?;
                for (i, ordering) in o.orderings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(
                        f,
                        "{} {}",
                        lambda_body(&ordering.expression),
                        ordering.direction
                    )?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for QueryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.main_from_clause)?;
        for clause in &self.body_clauses {
            write!(f, " {}", clause)?;
        }
        match &self.select_clause.projection {
            Some(projection) => write!(f, " select {}", lambda_body(projection))?,
            None => write!(f, " select <current>")?,
        }
        if self.select_clause.distinct {
            write!(f, " => Distinct()")?;
        }
        for modifier in &self.select_clause.result_modifiers {
            write!(f, " => {}", modifier)?;
        }
        Ok(())
    }
}
