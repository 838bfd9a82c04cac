use std::sync::Arc;

use super::{
    collector::{BodyStep, FromStep},
    errors::{ParseError, ParseResult},
    ChainParser,
};
use crate::expression::{partial_evaluation::evaluate_partially, Expr, ParameterExpr};

/// Parses the end of an operator chain into the main from step.
///
/// Accepted sources are expressions that evaluate to a non-null constant
/// (table handles, captured variables, conditionals between handles) and
/// member chains rooted at a lambda parameter, which is how a correlated
/// sub-query such as `s.Details.Where(...)` starts. A source that is the
/// whole query (`Students`, `Students.Distinct()`) selects its elements as is.
pub fn parse_source(
    parser: &mut ChainParser<'_, '_>,
    expression: &Arc<Expr>,
    potential_identifier: Option<&ParameterExpr>,
    is_top_level: bool,
) -> ParseResult<()> {
    let evaluated = evaluate_partially(expression);
    let accepted = match evaluated.as_ref() {
        Expr::Constant(constant) => !constant.value.is_null(),
        _ => is_parameter_rooted_member(&evaluated),
    };
    if !accepted {
        return Err(ParseError::UnsupportedExpression {
            kind: evaluated.kind_name().to_string(),
            expression: Arc::clone(expression),
            query: parser.query(),
        });
    }

    let identifier = match potential_identifier {
        Some(identifier) => identifier.clone(),
        None => parser.session().generate_identifier(&evaluated),
    };
    log::trace!("source '{}' bound to '{}'", evaluated, identifier.name);
    parser.collector().add_body_step(BodyStep::From(FromStep {
        identifier,
        source: evaluated,
    }));
    if is_top_level {
        parser.collector().add_projection(None);
    }
    Ok(())
}

fn is_parameter_rooted_member(expression: &Expr) -> bool {
    match expression {
        Expr::MemberAccess(access) => match access.expression.as_deref() {
            Some(Expr::Parameter(_)) => true,
            Some(inner) => is_parameter_rooted_member(inner),
            None => false,
        },
        _ => false,
    }
}
