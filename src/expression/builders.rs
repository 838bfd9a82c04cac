//! Node constructors.
//!
//! Every constructor returns a fresh `Arc<Expr>` and fills in the result type
//! the way a compiler would for the corresponding source construct.

use std::sync::Arc;

use super::{
    queryable_type, BinaryExpr, BinaryOperator, ConditionalExpr, ConstantExpr, ConstantValue,
    Expr, InvokeExpr, LambdaExpr, MemberExpr, MemberInfo, MethodCallExpr, NewArrayExpr, NewExpr,
    ParameterExpr, QueryableSource, TypeIsExpr, UnaryExpr, UnaryOperator,
};

impl Expr {
    pub fn constant(value: ConstantValue) -> Arc<Expr> {
        let type_name = value.type_name();
        Arc::new(Expr::Constant(ConstantExpr { value, type_name }))
    }

    /// A queryable table handle such as `Students` (elements of `element_type`).
    pub fn queryable(name: &str, element_type: &str) -> Arc<Expr> {
        Expr::constant(ConstantValue::Queryable(QueryableSource {
            name: name.to_string(),
            element_type: element_type.to_string(),
        }))
    }

    pub fn parameter(name: &str, type_name: &str) -> Arc<Expr> {
        Arc::new(Expr::Parameter(ParameterExpr::new(name, type_name)))
    }

    pub fn parameter_from(parameter: &ParameterExpr) -> Arc<Expr> {
        Arc::new(Expr::Parameter(parameter.clone()))
    }

    pub fn member(expression: Arc<Expr>, member: MemberInfo) -> Arc<Expr> {
        Arc::new(Expr::MemberAccess(MemberExpr {
            expression: Some(expression),
            member,
        }))
    }

    /// Static method call, the shape of every query operator.
    pub fn call(method: &str, arguments: Vec<Arc<Expr>>, type_name: &str) -> Arc<Expr> {
        Arc::new(Expr::Call(MethodCallExpr {
            object: None,
            method: method.to_string(),
            arguments,
            type_name: type_name.to_string(),
        }))
    }

    pub fn instance_call(
        object: Arc<Expr>,
        method: &str,
        arguments: Vec<Arc<Expr>>,
        type_name: &str,
    ) -> Arc<Expr> {
        Arc::new(Expr::Call(MethodCallExpr {
            object: Some(object),
            method: method.to_string(),
            arguments,
            type_name: type_name.to_string(),
        }))
    }

    pub fn unary(operator: UnaryOperator, operand: Arc<Expr>, type_name: &str) -> Arc<Expr> {
        Arc::new(Expr::Unary(UnaryExpr {
            operator,
            operand,
            type_name: type_name.to_string(),
        }))
    }

    pub fn quote(lambda: Arc<Expr>) -> Arc<Expr> {
        let type_name = lambda.type_name();
        Expr::unary(UnaryOperator::Quote, lambda, &type_name)
    }

    pub fn binary(operator: BinaryOperator, left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        let type_name = match operator {
            op if op.is_comparison() => "Boolean".to_string(),
            BinaryOperator::AndAlso | BinaryOperator::OrElse => "Boolean".to_string(),
            _ => left.type_name(),
        };
        Arc::new(Expr::Binary(BinaryExpr {
            operator,
            left,
            right,
            type_name,
        }))
    }

    pub fn lambda(parameters: Vec<ParameterExpr>, body: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Lambda(LambdaExpr { parameters, body }))
    }

    /// Anonymous object construction, e.g. `new { s, d }`.
    pub fn new_anonymous(type_name: &str, members: Vec<(&str, Arc<Expr>)>) -> Arc<Expr> {
        let (infos, arguments) = members
            .into_iter()
            .map(|(name, argument)| {
                (
                    MemberInfo::new(type_name, name, argument.type_name()),
                    argument,
                )
            })
            .unzip();
        Arc::new(Expr::New(NewExpr {
            type_name: type_name.to_string(),
            arguments,
            members: infos,
        }))
    }

    pub fn new_array(element_type: &str, expressions: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::NewArray(NewArrayExpr {
            element_type: element_type.to_string(),
            expressions,
        }))
    }

    pub fn conditional(test: Arc<Expr>, if_true: Arc<Expr>, if_false: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Conditional(ConditionalExpr {
            test,
            if_true,
            if_false,
        }))
    }

    pub fn type_is(expression: Arc<Expr>, type_operand: &str) -> Arc<Expr> {
        Arc::new(Expr::TypeIs(TypeIsExpr {
            expression,
            type_operand: type_operand.to_string(),
        }))
    }

    pub fn invoke(expression: Arc<Expr>, arguments: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Invoke(InvokeExpr {
            expression,
            arguments,
        }))
    }
}

/// Query operator calls shaped the way a query comprehension compiles them:
/// static calls with the source first and quoted lambdas after it.
pub mod linq {
    use super::*;

    fn lambda_result_type(lambda: &Arc<Expr>) -> String {
        match lambda.as_ref() {
            Expr::Lambda(l) => l.body.type_name(),
            other => other.type_name(),
        }
    }

    fn source_element_type(source: &Arc<Expr>) -> String {
        let type_name = source.type_name();
        super::super::element_type_of(&type_name)
            .map(str::to_string)
            .unwrap_or(type_name)
    }

    pub fn select(source: Arc<Expr>, selector: Arc<Expr>) -> Arc<Expr> {
        let result = queryable_type(&lambda_result_type(&selector));
        Expr::call("Select", vec![source, Expr::quote(selector)], &result)
    }

    pub fn select_many(
        source: Arc<Expr>,
        collection_selector: Arc<Expr>,
        result_selector: Arc<Expr>,
    ) -> Arc<Expr> {
        let result = queryable_type(&lambda_result_type(&result_selector));
        Expr::call(
            "SelectMany",
            vec![
                source,
                Expr::quote(collection_selector),
                Expr::quote(result_selector),
            ],
            &result,
        )
    }

    pub fn where_(source: Arc<Expr>, predicate: Arc<Expr>) -> Arc<Expr> {
        let result = source.type_name();
        Expr::call("Where", vec![source, Expr::quote(predicate)], &result)
    }

    pub fn order_by(source: Arc<Expr>, key_selector: Arc<Expr>) -> Arc<Expr> {
        ordering_call("OrderBy", source, key_selector)
    }

    pub fn order_by_descending(source: Arc<Expr>, key_selector: Arc<Expr>) -> Arc<Expr> {
        ordering_call("OrderByDescending", source, key_selector)
    }

    pub fn then_by(source: Arc<Expr>, key_selector: Arc<Expr>) -> Arc<Expr> {
        ordering_call("ThenBy", source, key_selector)
    }

    pub fn then_by_descending(source: Arc<Expr>, key_selector: Arc<Expr>) -> Arc<Expr> {
        ordering_call("ThenByDescending", source, key_selector)
    }

    fn ordering_call(method: &str, source: Arc<Expr>, key_selector: Arc<Expr>) -> Arc<Expr> {
        let result = format!("IOrderedQueryable<{}>", source_element_type(&source));
        Expr::call(method, vec![source, Expr::quote(key_selector)], &result)
    }

    pub fn distinct(source: Arc<Expr>) -> Arc<Expr> {
        let result = source.type_name();
        Expr::call("Distinct", vec![source], &result)
    }

    /// Result operator such as `Count()` or `First()`, with optional extra arguments.
    pub fn result_operator(method: &str, source: Arc<Expr>, extra: Vec<Arc<Expr>>) -> Arc<Expr> {
        let result = match method {
            "Count" | "LongCount" => "Int32".to_string(),
            "Any" | "All" => "Boolean".to_string(),
            "Take" | "Skip" => source.type_name(),
            _ => source_element_type(&source),
        };
        let mut arguments = vec![source];
        arguments.extend(extra);
        Expr::call(method, arguments, &result)
    }
}
