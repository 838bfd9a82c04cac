//! Query model shapes produced by the chain parser.

#[cfg(test)]
mod parser_integration_tests {
    use std::sync::Arc;

    use linqsql::{
        expression::{builders::linq, ConstantValue, Expr},
        parse,
        query_model::{BodyClause, FromClauseKind, OrderingDirection},
        ParseError,
    };

    use crate::common::*;

    fn student_first() -> Arc<Expr> {
        let s = param("s", "Student");
        lambda(&s, path(&Expr::parameter_from(&s), &["First"]))
    }

    fn student_last() -> Arc<Expr> {
        let s = param("s", "Student");
        lambda(&s, path(&Expr::parameter_from(&s), &["Last"]))
    }

    fn student_identity() -> Arc<Expr> {
        let s = param("s", "Student");
        lambda(&s, Expr::parameter_from(&s))
    }

    #[test]
    fn test_then_by_merges_into_order_by() {
        let query = linq::select(
            linq::then_by_descending(linq::order_by(students(), student_last()), student_first()),
            student_identity(),
        );
        let model = parse(&query).unwrap();

        assert_eq!(model.body_clauses.len(), 1);
        let BodyClause::OrderBy(order_by) = &model.body_clauses[0] else {
            panic!("expected an orderby clause");
        };
        let directions: Vec<_> = order_by.orderings.iter().map(|o| o.direction).collect();
        assert_eq!(
            directions,
            vec![OrderingDirection::Asc, OrderingDirection::Desc]
        );
        assert_eq!(
            model.to_string(),
            "from s in Students orderby s.Last asc, s.First desc select s"
        );
    }

    #[test]
    fn test_second_order_by_starts_new_clause() {
        let query = linq::order_by_descending(
            linq::order_by(students(), student_last()),
            student_first(),
        );
        let model = parse(&query).unwrap();

        let kinds: Vec<_> = model.body_clauses.iter().map(BodyClause::kind_name).collect();
        assert_eq!(kinds, vec!["OrderBy", "OrderBy"]);
        assert_eq!(model.select_clause.projection, None);
        assert_eq!(model.result_type(), "Student");
    }

    #[test]
    fn test_then_by_without_order_by() {
        let query = linq::then_by(students(), student_first());
        assert!(matches!(
            parse(&query),
            Err(ParseError::ThenByWithoutOrderBy { .. })
        ));
    }

    #[test]
    fn test_body_clauses_keep_source_order() {
        let s = param("s", "Student");
        let filtered = linq::where_(
            students(),
            lambda(&s, equals(path(&Expr::parameter_from(&s), &["ID"]), int(1))),
        );
        let ordered = linq::order_by(filtered, student_last());
        let refiltered = linq::where_(
            ordered,
            lambda(&s, equals(path(&Expr::parameter_from(&s), &["ID"]), int(2))),
        );
        let query = linq::select(refiltered, student_first());

        let model = parse(&query).unwrap();
        let kinds: Vec<_> = model.body_clauses.iter().map(BodyClause::kind_name).collect();
        assert_eq!(kinds, vec!["Where", "OrderBy", "Where"]);
        assert_eq!(
            model.to_string(),
            "from s in Students where (s.ID == 1) orderby s.Last asc where (s.ID == 2) select s.First"
        );
    }

    #[test]
    fn test_distinct_sets_flag() {
        let query = linq::distinct(linq::select(students(), student_first()));
        let model = parse(&query).unwrap();
        assert!(model.select_clause.distinct);
        assert_eq!(model.result_type(), "String");
        assert!(model.to_string().ends_with("=> Distinct()"));
    }

    #[test]
    fn test_distinct_over_bare_source_generates_identifier() {
        let query = linq::distinct(students());
        let model = parse(&query).unwrap();
        let identifier = model.main_from_clause.identifier();
        assert_eq!(identifier.name, "<generated>_0");
        assert_eq!(identifier.type_name, "Student");
        assert!(model.select_clause.distinct);
        assert_eq!(model.select_clause.projection, None);
    }

    #[test]
    fn test_nested_distinct_is_rejected() {
        let query = linq::select(linq::distinct(students()), student_first());
        match parse(&query) {
            Err(ParseError::NestedDistinct { expression, query: root }) => {
                assert_eq!(expression.to_string(), "Distinct(Students)");
                assert!(Arc::ptr_eq(&root, &query));
            }
            other => panic!("expected NestedDistinct, got {:?}", other),
        }
    }

    #[test]
    fn test_result_modifiers_in_application_order() {
        let take = linq::result_operator(
            "Take",
            linq::select(students(), student_first()),
            vec![int(3)],
        );
        let query = linq::result_operator("Count", take, Vec::new());
        let model = parse(&query).unwrap();

        let methods: Vec<_> = model
            .select_clause
            .result_modifiers
            .iter()
            .map(|m| m.method.as_str())
            .collect();
        assert_eq!(methods, vec!["Take", "Count"]);
        assert_eq!(
            model.select_clause.result_modifiers[0].arguments[0].as_constant(),
            Some(&ConstantValue::Int(3))
        );
    }

    #[test]
    fn test_nested_result_operator_is_rejected() {
        let query = linq::select(
            linq::result_operator("Take", students(), vec![int(3)]),
            student_first(),
        );
        assert!(matches!(
            parse(&query),
            Err(ParseError::UnsupportedExpression { .. })
        ));
    }

    #[test]
    fn test_sub_query_from_clause() {
        let s = param("s", "Student");
        let d = param("d", "StudentDetail");
        let details = path(&Expr::parameter_from(&s), &["Details"]);
        let filtered_details = linq::where_(
            details,
            lambda(
                &d,
                equals(path(&Expr::parameter_from(&d), &["Subject"]), Expr::constant(
                    ConstantValue::String("Maths".to_string()),
                )),
            ),
        );
        let query = linq::select_many(
            students(),
            lambda(&s, filtered_details),
            Expr::lambda(vec![s.clone(), d.clone()], Expr::parameter_from(&d)),
        );

        let model = parse(&query).unwrap();
        let clause = model.body_clauses[0].as_from_clause().unwrap();
        assert_eq!(clause.kind_name(), "SubQueryFrom");
        let FromClauseKind::SubQuery { query_model, .. } = clause.kind() else {
            panic!("expected a sub-query from clause");
        };
        assert_eq!(query_model.main_from_clause.identifier(), &d);
        assert!(Arc::ptr_eq(&query_model.parent_query().unwrap(), &model));
        assert!(model
            .all_nested_models()
            .iter()
            .any(|nested| Arc::ptr_eq(nested, query_model)));
    }

    #[test]
    fn test_sub_query_in_from_projection() {
        let s = param("s", "Student");
        let d = param("d", "StudentDetail");
        let o = param("o", "Order");
        let matching_orders = linq::where_(
            orders(),
            lambda(
                &o,
                equals(
                    path(&Expr::parameter_from(&o), &["StudentID"]),
                    path(&Expr::parameter_from(&s), &["ID"]),
                ),
            ),
        );
        let query = linq::select_many(
            students(),
            lambda(&s, path(&Expr::parameter_from(&s), &["Details"])),
            Expr::lambda(
                vec![s.clone(), d.clone()],
                linq::result_operator("Any", matching_orders, Vec::new()),
            ),
        );

        let model = parse(&query).unwrap();
        let clause = model.body_clauses[0].as_from_clause().unwrap();
        let FromClauseKind::Additional {
            projection: Some(projection),
            ..
        } = clause.kind()
        else {
            panic!("expected an additional from clause with a projection");
        };
        let body = body_of(projection);
        let Expr::SubQuery(sub_query) = body.as_ref() else {
            panic!("expected the projection body to be a sub-query");
        };
        assert_eq!(sub_query.model.main_from_clause.identifier(), &o);
        assert!(Arc::ptr_eq(&sub_query.model.parent_query().unwrap(), &model));
        assert!(model
            .sub_queries()
            .iter()
            .any(|nested| Arc::ptr_eq(nested, &sub_query.model)));
    }

    #[test]
    fn test_unsupported_source() {
        let query = linq::select(Expr::constant(ConstantValue::Null), student_first());
        assert!(matches!(
            parse(&query),
            Err(ParseError::UnsupportedExpression { .. })
        ));
    }

    #[test]
    fn test_select_requires_lambda() {
        let query = Expr::call(
            "Select",
            vec![students(), Expr::parameter("selector", "Func<Student, String>")],
            "IQueryable<String>",
        );
        assert!(matches!(
            parse(&query),
            Err(ParseError::InvalidArgumentShape { index: 1, .. })
        ));
    }

    #[test]
    fn test_wrong_argument_count() {
        let query = Expr::call("Where", vec![students()], "IQueryable<Student>");
        assert!(matches!(
            parse(&query),
            Err(ParseError::WrongArgumentCount {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_let_requires_anonymous_object() {
        let query = linq::select(
            linq::select(students(), student_first()),
            lambda(&param("f", "String"), Expr::parameter("f", "String")),
        );
        assert!(matches!(
            parse(&query),
            Err(ParseError::UnsupportedLetProjection { .. })
        ));
    }
}
