//! Operator chain parser.
//!
//! Turns an expression such as
//!
//! ```text
//! Select(Where(Students, s => (s.ID == 5)), s => s.First)
//! ```
//!
//! into a [`QueryModel`] (`from s in Students where (s.ID == 5) select s.First`).
//! Parsing happens in two phases: [`ChainParser`] walks the chain source-first
//! and fills a [`ParseResultCollector`]; [`QueryModelBuilder`] then assembles
//! clauses from the collected steps, parsing embedded operator chains into
//! sub-queries along the way.

use std::sync::Arc;

use crate::{
    expression::{element_type_of, Expr, MethodCallExpr, ParameterExpr},
    query_model::QueryModel,
};

pub mod builder;
pub mod collector;
pub mod errors;
pub mod operators;
pub mod source;
pub mod subquery_finder;

pub use builder::QueryModelBuilder;
pub use collector::{BodyStep, ParseResultCollector};
pub use errors::{ParseError, ParseResult};

const GENERATED_IDENTIFIER_PREFIX: &str = "<generated>_";

/// Parses an operator chain into a query model.
pub fn parse(expression: &Arc<Expr>) -> ParseResult<Arc<QueryModel>> {
    log::debug!("parsing query '{}'", expression);
    let mut session = ParseSession::new(expression);
    let model = session.parse_model(expression)?;
    log::debug!("parsed query model: {}", model);
    Ok(model)
}

/// State shared by the parse of a query and all of its sub-queries.
pub struct ParseSession<'q> {
    query: &'q Arc<Expr>,
    generated_identifiers: usize,
}

impl<'q> ParseSession<'q> {
    pub fn new(query: &'q Arc<Expr>) -> Self {
        ParseSession {
            query,
            generated_identifiers: 0,
        }
    }

    /// Root of the whole query, reported in errors.
    pub fn query(&self) -> &Arc<Expr> {
        self.query
    }

    /// Parses `expression` (the whole query or an embedded chain) into its own model.
    pub fn parse_model(&mut self, expression: &Arc<Expr>) -> ParseResult<Arc<QueryModel>> {
        let mut chain = ChainParser::new(self);
        chain.parse(expression, None, true)?;
        let collector = chain.into_collector();
        QueryModelBuilder::new(self).build(expression, collector)
    }

    /// Identifier for a source no lambda parameter names, e.g. the source of a
    /// top-level `Distinct()`.
    pub fn generate_identifier(&mut self, source: &Expr) -> ParameterExpr {
        let type_name = source.type_name();
        let element_type = element_type_of(&type_name)
            .map(str::to_string)
            .unwrap_or(type_name);
        let name = format!(
            "{}{}",
            GENERATED_IDENTIFIER_PREFIX, self.generated_identifiers
        );
        self.generated_identifiers += 1;
        ParameterExpr::new(name, element_type)
    }
}

/// First phase: walks an operator chain and collects its steps.
pub struct ChainParser<'s, 'q> {
    session: &'s mut ParseSession<'q>,
    collector: ParseResultCollector,
}

impl<'s, 'q> ChainParser<'s, 'q> {
    pub fn new(session: &'s mut ParseSession<'q>) -> Self {
        ChainParser {
            session,
            collector: ParseResultCollector::new(),
        }
    }

    pub fn into_collector(self) -> ParseResultCollector {
        self.collector
    }

    pub fn collector(&mut self) -> &mut ParseResultCollector {
        &mut self.collector
    }

    pub fn session(&mut self) -> &mut ParseSession<'q> {
        self.session
    }

    pub fn query(&self) -> Arc<Expr> {
        Arc::clone(self.session.query())
    }

    /// Parses `expression`. `potential_identifier` is the first parameter of
    /// the consuming operator's lambda, used to name a plain source.
    /// `is_top_level` is false below any operator other than `Distinct` and
    /// result operators.
    pub fn parse(
        &mut self,
        expression: &Arc<Expr>,
        potential_identifier: Option<&ParameterExpr>,
        is_top_level: bool,
    ) -> ParseResult<()> {
        if let Expr::Call(call) = expression.as_ref() {
            if call.object.is_none() {
                if let Some(parser) = operators::operator_parser(&call.method) {
                    log::debug!("parsing operator {}", call.method);
                    return parser(self, expression, call, potential_identifier, is_top_level);
                }
                if operators::is_result_operator(&call.method) {
                    return self.parse_result_operator(
                        expression,
                        call,
                        potential_identifier,
                        is_top_level,
                    );
                }
            }
        }
        source::parse_source(self, expression, potential_identifier, is_top_level)
    }

    fn parse_result_operator(
        &mut self,
        expression: &Arc<Expr>,
        call: &MethodCallExpr,
        potential_identifier: Option<&ParameterExpr>,
        is_top_level: bool,
    ) -> ParseResult<()> {
        if !is_top_level {
            return Err(ParseError::UnsupportedExpression {
                kind: format!("result operator {} below the end of the query", call.method),
                expression: Arc::clone(expression),
                query: self.query(),
            });
        }
        let Some((source, arguments)) = call.arguments.split_first() else {
            return Err(ParseError::WrongArgumentCount {
                method: call.method.clone(),
                expected: 1,
                found: 0,
                expression: Arc::clone(expression),
                query: self.query(),
            });
        };
        self.parse(source, potential_identifier, true)?;
        self.collector
            .add_result_modifier(crate::query_model::ResultModifier {
                method: call.method.clone(),
                arguments: arguments.to_vec(),
            });
        Ok(())
    }
}
