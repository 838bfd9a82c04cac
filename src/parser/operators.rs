//! Query operator registry.
//!
//! Maps operator method names to the functions that parse them. Names not in
//! the registry are either result operators (recorded on the select clause)
//! or the end of the chain (a query source).

use std::{collections::HashMap, sync::Arc};

use super::{
    collector::{BodyStep, FromStep, LetStep, OrderStep, WhereStep},
    errors::{ParseError, ParseResult},
    ChainParser,
};
use crate::{
    expression::{strip_quotes, Expr, MethodCallExpr, ParameterExpr},
    query_model::OrderingDirection,
};

pub type OperatorParser = fn(
    &mut ChainParser<'_, '_>,
    &Arc<Expr>,
    &MethodCallExpr,
    Option<&ParameterExpr>,
    bool,
) -> ParseResult<()>;

/// Look up the parser for an operator method name
pub fn operator_parser(method: &str) -> Option<OperatorParser> {
    OPERATOR_PARSERS.get(method).copied()
}

pub fn is_result_operator(method: &str) -> bool {
    RESULT_OPERATORS.contains(&method)
}

/// True for a static call the parser treats as a nested query: a registered
/// operator, or a result operator applied to one.
pub fn is_operator_chain(expression: &Expr) -> bool {
    match expression {
        Expr::Call(call) if call.object.is_none() => {
            operator_parser(&call.method).is_some()
                || (is_result_operator(&call.method)
                    && call
                        .arguments
                        .first()
                        .is_some_and(|source| is_operator_chain(source)))
        }
        _ => false,
    }
}

const RESULT_OPERATORS: &[&str] = &[
    "Count",
    "LongCount",
    "Any",
    "All",
    "First",
    "FirstOrDefault",
    "Single",
    "SingleOrDefault",
    "Last",
    "LastOrDefault",
    "Take",
    "Skip",
    "Max",
    "Min",
    "Sum",
    "Average",
];

lazy_static::lazy_static! {
    static ref OPERATOR_PARSERS: HashMap<&'static str, OperatorParser> = {
        let mut m: HashMap<&'static str, OperatorParser> = HashMap::new();
        m.insert("Select", parse_select);
        m.insert("SelectMany", parse_select_many);
        m.insert("Where", parse_where);
        m.insert("OrderBy", parse_order_by);
        m.insert("OrderByDescending", parse_order_by_descending);
        m.insert("ThenBy", parse_then_by);
        m.insert("ThenByDescending", parse_then_by_descending);
        m.insert("Distinct", parse_distinct);
        m
    };
}

fn check_argument_count(
    parser: &ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    expected: usize,
) -> ParseResult<()> {
    if call.arguments.len() == expected {
        Ok(())
    } else {
        Err(ParseError::WrongArgumentCount {
            method: call.method.clone(),
            expected,
            found: call.arguments.len(),
            expression: Arc::clone(expression),
            query: parser.query(),
        })
    }
}

/// Argument `index` as a lambda with `parameters` parameters (quotes stripped).
fn lambda_argument(
    parser: &ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    index: usize,
    parameters: usize,
) -> ParseResult<Arc<Expr>> {
    let argument = strip_quotes(&call.arguments[index]);
    match argument.as_ref() {
        Expr::Lambda(lambda) if lambda.parameters.len() == parameters => Ok(Arc::clone(argument)),
        _ => Err(ParseError::InvalidArgumentShape {
            method: call.method.clone(),
            index,
            parameters,
            argument: Arc::clone(argument),
            expression: Arc::clone(expression),
            query: parser.query(),
        }),
    }
}

fn first_parameter(lambda: &Arc<Expr>) -> Option<ParameterExpr> {
    lambda
        .as_lambda()
        .and_then(|l| l.parameters.first().cloned())
}

fn parse_select(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    check_argument_count(parser, expression, call, 2)?;
    let selector = lambda_argument(parser, expression, call, 1, 1)?;
    parser.parse(&call.arguments[0], first_parameter(&selector).as_ref(), false)?;

    if !is_top_level {
        // A nested Select introduces a range variable: `let`.
        parser.collector().add_body_step(BodyStep::Let(LetStep {
            projection: Arc::clone(&selector),
        }));
    }
    parser.collector().add_projection(Some(selector));
    Ok(())
}

fn parse_select_many(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    _is_top_level: bool,
) -> ParseResult<()> {
    check_argument_count(parser, expression, call, 3)?;
    let collection_selector = lambda_argument(parser, expression, call, 1, 1)?;
    let result_selector = lambda_argument(parser, expression, call, 2, 2)?;
    parser.parse(
        &call.arguments[0],
        first_parameter(&collection_selector).as_ref(),
        false,
    )?;

    let identifier = result_selector
        .as_lambda()
        .and_then(|l| l.parameters.get(1).cloned())
        .ok_or_else(|| ParseError::InvalidArgumentShape {
            method: call.method.clone(),
            index: 2,
            parameters: 2,
            argument: Arc::clone(&result_selector),
            expression: Arc::clone(expression),
            query: parser.query(),
        })?;
    parser.collector().add_body_step(BodyStep::From(FromStep {
        identifier,
        source: collection_selector,
    }));
    parser.collector().add_projection(Some(result_selector));
    Ok(())
}

fn parse_where(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    check_argument_count(parser, expression, call, 2)?;
    let predicate = lambda_argument(parser, expression, call, 1, 1)?;
    parser.parse(&call.arguments[0], first_parameter(&predicate).as_ref(), false)?;

    parser
        .collector()
        .add_body_step(BodyStep::Where(WhereStep { predicate }));
    if is_top_level {
        parser.collector().add_projection(None);
    }
    Ok(())
}

fn parse_ordering(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    is_top_level: bool,
    direction: OrderingDirection,
    first_order_by: bool,
) -> ParseResult<()> {
    check_argument_count(parser, expression, call, 2)?;
    let key_selector = lambda_argument(parser, expression, call, 1, 1)?;
    parser.parse(
        &call.arguments[0],
        first_parameter(&key_selector).as_ref(),
        false,
    )?;

    parser.collector().add_body_step(BodyStep::Order(OrderStep {
        expression: key_selector,
        direction,
        first_order_by,
    }));
    if is_top_level {
        parser.collector().add_projection(None);
    }
    Ok(())
}

fn parse_order_by(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    parse_ordering(parser, expression, call, is_top_level, OrderingDirection::Asc, true)
}

fn parse_order_by_descending(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    parse_ordering(parser, expression, call, is_top_level, OrderingDirection::Desc, true)
}

fn parse_then_by(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    parse_ordering(parser, expression, call, is_top_level, OrderingDirection::Asc, false)
}

fn parse_then_by_descending(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    _potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    parse_ordering(parser, expression, call, is_top_level, OrderingDirection::Desc, false)
}

fn parse_distinct(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    call: &MethodCallExpr,
    potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    check_argument_count(parser, expression, call, 1)?;
    if !is_top_level {
        return Err(ParseError::NestedDistinct {
            expression: Arc::clone(expression),
            query: parser.query(),
        });
    }
    parser.parse(&call.arguments[0], potential_identifier, true)?;
    parser.collector().set_distinct();
    Ok(())
}
