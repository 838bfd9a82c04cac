use std::sync::Arc;

use thiserror::Error;

use crate::expression::Expr;

/// Errors raised while turning an operator chain into a query model. Every
/// variant carries the offending subexpression and the root of the query it
/// belongs to.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("'{method}' expects {expected} arguments, but got {found} in '{expression}' (query: '{query}')")]
    WrongArgumentCount {
        method: String,
        expected: usize,
        found: usize,
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("Argument {index} of '{method}' must be a lambda with {parameters} parameter(s), but got '{argument}' in '{expression}' (query: '{query}')")]
    InvalidArgumentShape {
        method: String,
        index: usize,
        parameters: usize,
        argument: Arc<Expr>,
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("Expression '{expression}' ({kind}) is neither a query operator nor a query source (query: '{query}')")]
    UnsupportedExpression {
        kind: String,
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("Distinct is only supported at the end of the whole query, but appears in '{expression}' (query: '{query}')")]
    NestedDistinct {
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("Query '{expression}' does not start with a from clause (query: '{query}')")]
    MissingMainFrom {
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("No projection left for the {clause} clause built from '{expression}' (query: '{query}')")]
    MissingProjection {
        clause: String,
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("Query '{expression}' has no select projection (query: '{query}')")]
    MissingSelectProjection {
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("ThenBy ordering '{expression}' is not preceded by an OrderBy (query: '{query}')")]
    ThenByWithoutOrderBy {
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },

    #[error("Let projection '{expression}' must build an anonymous object whose last member is the let variable (query: '{query}')")]
    UnsupportedLetProjection {
        expression: Arc<Expr>,
        query: Arc<Expr>,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;
