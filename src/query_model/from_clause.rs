//! From-clause variants.
//!
//! Every clause that introduces a range variable is a [`FromClause`]: the main
//! source, additional `from` clauses, sub-query sources and `let` bindings.
//! They share an identifier, a lazily resolved [`ColumnSource`] and the list of
//! joins the resolver attached to them; [`FromClauseKind`] carries the part
//! that differs.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::{
    expression::{Expr, ParameterExpr},
    query_model::QueryModel,
    resolver::{
        errors::{FieldAccessResolveError, ResolveError},
        types::{ColumnSource, LetSource, SingleJoin, SubQuerySource, Table},
    },
    schema::SchemaProvider,
};

/// Name and element type of a range variable.
pub type Identifier = ParameterExpr;

#[derive(Debug, Clone)]
pub enum FromClauseKind {
    /// `from s in Students`: `source` is the constant-folded (or member) source.
    Main { source: Arc<Expr> },
    /// `from d in s.Details`: `from_expression` is the collection selector lambda.
    Additional {
        from_expression: Arc<Expr>,
        projection: Option<Arc<Expr>>,
    },
    /// `from o in (<nested query>)`.
    SubQuery {
        query_model: Arc<QueryModel>,
        projection: Option<Arc<Expr>>,
    },
    /// `let x = expression`; `projection` is the anonymous-type selector it came from.
    Let {
        expression: Arc<Expr>,
        projection: Arc<Expr>,
    },
}

#[derive(Debug)]
pub struct FromClause {
    identifier: Identifier,
    kind: FromClauseKind,
    column_source: OnceLock<ColumnSource>,
    joins: RwLock<Vec<SingleJoin>>,
}

impl FromClause {
    pub fn new(identifier: Identifier, kind: FromClauseKind) -> Self {
        FromClause {
            identifier,
            kind,
            column_source: OnceLock::new(),
            joins: RwLock::new(Vec::new()),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn kind(&self) -> &FromClauseKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            FromClauseKind::Main { .. } => "MainFrom",
            FromClauseKind::Additional { .. } => "AdditionalFrom",
            FromClauseKind::SubQuery { .. } => "SubQueryFrom",
            FromClauseKind::Let { .. } => "Let",
        }
    }

    /// True when `reference` names this clause's range variable (name and type).
    pub fn is_identified_by(&self, reference: &ParameterExpr) -> bool {
        self.identifier == *reference
    }

    /// The nested query of a sub-query clause.
    pub fn sub_query(&self) -> Option<&Arc<QueryModel>> {
        match &self.kind {
            FromClauseKind::SubQuery { query_model, .. } => Some(query_model),
            _ => None,
        }
    }

    /// Column source of this clause, computed on first use and cached for the
    /// rest of the resolution session.
    ///
    /// Table sources carry the identifier name as alias, so they are already
    /// distinguishable by value from the unaliased tables joins create.
    pub fn column_source(&self, provider: &dyn SchemaProvider) -> Result<ColumnSource, ResolveError> {
        if let Some(source) = self.column_source.get() {
            return Ok(source.clone());
        }

        let source = match &self.kind {
            FromClauseKind::Main { .. } | FromClauseKind::Additional { .. } => {
                let table_name = provider
                    .table_name(&self.identifier.type_name)
                    .ok_or_else(|| FieldAccessResolveError::UnmappedType {
                        type_name: self.identifier.type_name.clone(),
                    })?;
                ColumnSource::Table(Arc::new(Table::with_alias(
                    table_name,
                    self.identifier.name.clone(),
                )))
            }
            FromClauseKind::SubQuery { query_model, .. } => {
                ColumnSource::SubQuery(Arc::new(SubQuerySource {
                    query_model: Arc::clone(query_model),
                    alias: self.identifier.name.clone(),
                }))
            }
            FromClauseKind::Let { expression, .. } => ColumnSource::Let(Arc::new(LetSource {
                alias: self.identifier.name.clone(),
                is_table: expression.as_parameter().is_some(),
            })),
        };

        log::debug!(
            "column source for {} clause '{}': {}",
            self.kind_name(),
            self.identifier.name,
            source
        );
        Ok(self.column_source.get_or_init(|| source).clone())
    }

    /// Joins resolved from this clause, in the order they were first needed.
    pub fn joins(&self) -> Vec<SingleJoin> {
        self.joins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attaches a join unless an equal one is already attached.
    pub fn add_join(&self, join: SingleJoin) -> bool {
        let mut joins = self.joins.write().unwrap_or_else(PoisonError::into_inner);
        if joins.contains(&join) {
            return false;
        }
        joins.push(join);
        true
    }
}
