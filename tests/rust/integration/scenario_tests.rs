//! End-to-end resolution over the school mapping: parse a query, then resolve
//! the references of its clauses the way a SQL generator would.

#[cfg(test)]
mod scenario_integration_tests {
    use std::sync::Arc;

    use linqsql::{
        expression::{builders::linq, Expr, ParameterExpr},
        parse,
        query_model::{BodyClause, QueryModel},
        resolve_field,
        resolver::{ColumnSource, FieldAccessResolveError, NotSupportedError},
        ClauseKind, JoinedTableContext, ResolveError,
    };

    use crate::common::*;

    fn table_of(source: &ColumnSource) -> (&str, Option<&str>) {
        let table = source.as_table().expect("table source");
        (table.name(), table.alias())
    }

    /// from sd in StudentDetails select sd.Student.First
    #[test]
    fn test_select_through_relation_joins_target_table() {
        let schema = school_schema();
        let sd = param("sd", "StudentDetail");
        let query = linq::select(
            student_details(),
            lambda(&sd, path(&Expr::parameter_from(&sd), &["Student", "First"])),
        );

        let model = parse(&query).unwrap();
        assert_eq!(model.main_from_clause.identifier(), &sd);
        assert!(model.body_clauses.is_empty());
        assert_eq!(model.to_string(), "from sd in StudentDetails select sd.Student.First");

        let projection = body_of(model.select_clause.projection.as_ref().unwrap());
        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &projection, &mut context, ClauseKind::Select).unwrap();

        assert_eq!(field.member.as_ref().map(|m| m.name.as_str()), Some("First"));
        assert_eq!(table_of(&field.source_path.first_source), ("detailTable", Some("sd")));
        assert_eq!(field.source_path.joins.len(), 1);

        let join = &field.source_path.joins[0];
        assert_eq!(
            join.left_column.name.as_deref(),
            Some("Student_Detail_to_Student_FK")
        );
        assert!(join
            .left_column
            .source
            .is_same_instance(&field.source_path.first_source));
        assert_eq!(join.right_column.name.as_deref(), Some("IDColumn"));
        assert_eq!(table_of(&join.right_column.source), ("studentTable", None));

        let column = field.column.as_ref().unwrap();
        assert_eq!(column.name.as_deref(), Some("FirstColumn"));
        assert!(column.source.is_same_instance(&join.right_column.source));

        context.finalize_aliases(&model);
        assert_eq!(table_of(&column.source), ("studentTable", Some("j0")));
        assert_eq!(
            field.to_string(),
            "j0.FirstColumn via [sd.Student_Detail_to_Student_FK = j0.IDColumn]"
        );
        assert_eq!(model.main_from_clause.joins(), field.source_path.joins);
    }

    /// from sd in StudentDetails where sd.IndustrialSector.ID == 5 select sd
    #[test]
    fn test_where_on_related_key_reads_foreign_key() {
        let schema = school_schema();
        let sd = param("sd", "StudentDetail");
        let query = linq::where_(
            student_details(),
            lambda(
                &sd,
                equals(
                    path(&Expr::parameter_from(&sd), &["IndustrialSector", "ID"]),
                    int(5),
                ),
            ),
        );

        let model = parse(&query).unwrap();
        let BodyClause::Where(clause) = &model.body_clauses[0] else {
            panic!("expected a where clause");
        };
        let predicate = body_of(&clause.predicate);
        let Expr::Binary(comparison) = predicate.as_ref() else {
            panic!("expected a comparison");
        };

        let mut context = JoinedTableContext::new();
        let field = resolve_field(
            &schema,
            &model,
            &comparison.left,
            &mut context,
            ClauseKind::Where,
        )
        .unwrap();

        assert!(field.source_path.joins.is_empty());
        assert_eq!(context.count(), 0);
        let column = field.column.unwrap();
        assert_eq!(
            column.name.as_deref(),
            Some("Student_Detail_to_IndustrialSector_FK")
        );
        assert_eq!(table_of(&column.source), ("detailTable", Some("sd")));
        assert!(model.main_from_clause.joins().is_empty());
    }

    #[test]
    fn test_select_on_related_key_still_joins() {
        let schema = school_schema();
        let sd = param("sd", "StudentDetail");
        let reference = path(&Expr::parameter_from(&sd), &["IndustrialSector", "ID"]);
        let query = linq::select(student_details(), lambda(&sd, Arc::clone(&reference)));
        let model = parse(&query).unwrap();

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &reference, &mut context, ClauseKind::Select).unwrap();
        assert_eq!(field.source_path.joins.len(), 1);
        assert_eq!(field.column.unwrap().name.as_deref(), Some("IDColumn"));
    }

    /// from s in Students from d in s.Details select d
    #[test]
    fn test_additional_from_owns_its_identifier() {
        let schema = school_schema();
        let s = param("s", "Student");
        let d = param("d", "StudentDetail");
        let query = linq::select_many(
            students(),
            lambda(&s, path(&Expr::parameter_from(&s), &["Details"])),
            Expr::lambda(vec![s.clone(), d.clone()], Expr::parameter_from(&d)),
        );

        let model = parse(&query).unwrap();
        assert_eq!(model.body_clauses.len(), 1);
        assert_eq!(model.body_clauses[0].kind_name(), "AdditionalFrom");
        assert_eq!(model.to_string(), "from s in Students from d in s.Details select d");

        let owner = model.find_from_clause(&d).unwrap();
        assert_eq!(owner.kind_name(), "AdditionalFrom");

        let projection = body_of(model.select_clause.projection.as_ref().unwrap());
        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &projection, &mut context, ClauseKind::Select).unwrap();

        assert_eq!(field.member, None);
        assert!(field.source_path.joins.is_empty());
        let column = field.column.unwrap();
        assert_eq!(column.name, None);
        assert!(column
            .source
            .is_same_instance(&owner.column_source(&schema).unwrap()));
        assert_eq!(table_of(&column.source), ("detailTable", Some("d")));
    }

    #[test]
    fn test_where_on_entity_reads_primary_key() {
        let schema = school_schema();
        let s = param("s", "Student");
        let reference = Expr::parameter_from(&s);
        let query = linq::where_(students(), lambda(&s, equals(Arc::clone(&reference), int(1))));
        let model = parse(&query).unwrap();

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &reference, &mut context, ClauseKind::Where).unwrap();
        assert_eq!(field.column.unwrap().to_string(), "s.IDColumn");
    }

    /// from s in Students
    /// where (from o in Orders where o.StudentID == s.ID select o).Any()
    /// select s
    #[test]
    fn test_correlated_sub_query_resolves_outer_identifier() {
        let schema = school_schema();
        let s = param("s", "Student");
        let o = param("o", "Order");
        let outer_id = path(&Expr::parameter_from(&s), &["ID"]);
        let inner = linq::where_(
            orders(),
            lambda(
                &o,
                equals(
                    path(&Expr::parameter_from(&o), &["StudentID"]),
                    Arc::clone(&outer_id),
                ),
            ),
        );
        let query = linq::where_(
            students(),
            lambda(&s, linq::result_operator("Any", inner, Vec::new())),
        );

        let model = parse(&query).unwrap();
        assert_eq!(model.sub_queries().len(), 1);
        let sub_query = &model.sub_queries()[0];
        assert!(Arc::ptr_eq(&sub_query.parent_query().unwrap(), &model));
        assert_eq!(sub_query.select_clause.result_modifiers[0].method, "Any");
        assert!(sub_query.find_from_clause(&s).is_none());

        let BodyClause::Where(outer_where) = &model.body_clauses[0] else {
            panic!("expected a where clause");
        };
        assert!(matches!(
            body_of(&outer_where.predicate).as_ref(),
            Expr::SubQuery(_)
        ));

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, sub_query, &outer_id, &mut context, ClauseKind::Where).unwrap();
        assert!(field
            .source_path
            .first_source
            .is_same_instance(&model.main_from_clause.column_source(&schema).unwrap()));
        assert_eq!(field.column.unwrap().to_string(), "s.IDColumn");

        let inner_key = path(&Expr::parameter_from(&o), &["StudentID"]);
        let field =
            resolve_field(&schema, sub_query, &inner_key, &mut context, ClauseKind::Where).unwrap();
        assert_eq!(field.column.unwrap().to_string(), "o.StudentIDColumn");
    }

    /// from s in Students
    /// where (from o in Orders
    ///        where (from d in StudentDetails where d.Subject == s.First select d).Any()
    ///        select o).Any()
    /// select s
    #[test]
    fn test_sub_query_resolves_grandparent_identifier() {
        let schema = school_schema();
        let s = param("s", "Student");
        let o = param("o", "Order");
        let d = param("d", "StudentDetail");
        let outer_first = path(&Expr::parameter_from(&s), &["First"]);
        let innermost = linq::where_(
            student_details(),
            lambda(
                &d,
                equals(
                    path(&Expr::parameter_from(&d), &["Subject"]),
                    Arc::clone(&outer_first),
                ),
            ),
        );
        let middle = linq::where_(
            orders(),
            lambda(&o, linq::result_operator("Any", innermost, Vec::new())),
        );
        let query = linq::where_(
            students(),
            lambda(&s, linq::result_operator("Any", middle, Vec::new())),
        );

        let model = parse(&query).unwrap();
        let middle_model = &model.sub_queries()[0];
        let innermost_model = &middle_model.sub_queries()[0];
        assert!(Arc::ptr_eq(&middle_model.parent_query().unwrap(), &model));
        assert!(Arc::ptr_eq(
            &innermost_model.parent_query().unwrap(),
            middle_model
        ));
        assert_eq!(model.all_nested_models().len(), 2);

        let mut context = JoinedTableContext::new();
        let field = resolve_field(
            &schema,
            innermost_model,
            &outer_first,
            &mut context,
            ClauseKind::Where,
        )
        .unwrap();
        assert!(field
            .source_path
            .first_source
            .is_same_instance(&model.main_from_clause.column_source(&schema).unwrap()));
        assert_eq!(field.column.unwrap().to_string(), "s.FirstColumn");

        // The middle identifier is visible from the innermost model, not from the root.
        let order_key = path(&Expr::parameter_from(&o), &["StudentID"]);
        let field = resolve_field(
            &schema,
            innermost_model,
            &order_key,
            &mut context,
            ClauseKind::Where,
        )
        .unwrap();
        assert_eq!(field.column.unwrap().to_string(), "o.StudentIDColumn");
        assert!(matches!(
            resolve_field(&schema, &model, &order_key, &mut context, ClauseKind::Where),
            Err(ResolveError::FieldAccess(
                FieldAccessResolveError::NoFromClauseIdentifier { .. }
            ))
        ));
    }

    #[test]
    fn test_inner_identifier_is_not_visible_outside() {
        let schema = school_schema();
        let s = param("s", "Student");
        let query = linq::select(students(), lambda(&s, Expr::parameter_from(&s)));
        let model = parse(&query).unwrap();

        let stray = path(&Expr::parameter("o", "Order"), &["StudentID"]);
        let mut context = JoinedTableContext::new();
        let result = resolve_field(&schema, &model, &stray, &mut context, ClauseKind::Select);
        assert!(matches!(
            result,
            Err(ResolveError::FieldAccess(
                FieldAccessResolveError::NoFromClauseIdentifier { .. }
            ))
        ));
    }

    /// from s in Students let f = s.First where f == "x" select s.Last
    #[test]
    fn test_let_and_transparent_identifiers() {
        let schema = school_schema();
        let s = param("s", "Student");
        let anonymous = "<>f__AnonymousType0";
        let t = param("<>h__TransparentIdentifier0", anonymous);
        let t_expr = Expr::parameter_from(&t);

        let with_let = linq::select(
            students(),
            lambda(
                &s,
                Expr::new_anonymous(
                    anonymous,
                    vec![
                        ("s", Expr::parameter_from(&s)),
                        ("f", path(&Expr::parameter_from(&s), &["First"])),
                    ],
                ),
            ),
        );
        let let_reference = Expr::member(
            Arc::clone(&t_expr),
            linq_member(anonymous, "f", "String"),
        );
        let filtered = linq::where_(
            with_let,
            lambda(
                &t,
                equals(
                    Arc::clone(&let_reference),
                    Expr::constant(linqsql::expression::ConstantValue::String("x".to_string())),
                ),
            ),
        );
        let last = path(
            &Expr::member(Arc::clone(&t_expr), linq_member(anonymous, "s", "Student")),
            &["Last"],
        );
        let query = linq::select(filtered, lambda(&t, Arc::clone(&last)));

        let model = parse(&query).unwrap();
        assert_eq!(
            model
                .body_clauses
                .iter()
                .map(BodyClause::kind_name)
                .collect::<Vec<_>>(),
            vec!["Let", "Where"]
        );
        let let_clause = model.body_clauses[0].as_from_clause().unwrap();
        assert_eq!(let_clause.identifier(), &param("f", "String"));

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &last, &mut context, ClauseKind::Select).unwrap();
        assert_eq!(field.column.unwrap().to_string(), "s.LastColumn");

        let field =
            resolve_field(&schema, &model, &let_reference, &mut context, ClauseKind::Where)
                .unwrap();
        assert_eq!(field.member, None);
        let column = field.column.unwrap();
        assert!(matches!(column.source, ColumnSource::Let(ref l) if l.alias == "f" && !l.is_table));
    }

    /// from s in Students let f = s.First let l = s.Last select s.First
    #[test]
    fn test_nested_transparent_identifiers() {
        let schema = school_schema();
        let s = param("s", "Student");
        let first_anonymous = "<>f__AnonymousType0";
        let second_anonymous = "<>f__AnonymousType1";
        let t0 = param("<>h__TransparentIdentifier0", first_anonymous);
        let t1 = param("<>h__TransparentIdentifier1", second_anonymous);
        let t0_s = Expr::member(
            Expr::parameter_from(&t0),
            linq_member(first_anonymous, "s", "Student"),
        );

        let first_let = linq::select(
            students(),
            lambda(
                &s,
                Expr::new_anonymous(
                    first_anonymous,
                    vec![
                        ("s", Expr::parameter_from(&s)),
                        ("f", path(&Expr::parameter_from(&s), &["First"])),
                    ],
                ),
            ),
        );
        let second_let = linq::select(
            first_let,
            lambda(
                &t0,
                Expr::new_anonymous(
                    second_anonymous,
                    vec![
                        ("<>h__TransparentIdentifier0", Expr::parameter_from(&t0)),
                        ("l", path(&t0_s, &["Last"])),
                    ],
                ),
            ),
        );
        let t1_t0 = Expr::member(
            Expr::parameter_from(&t1),
            linq_member(
                second_anonymous,
                "<>h__TransparentIdentifier0",
                first_anonymous,
            ),
        );
        let first = path(
            &Expr::member(t1_t0, linq_member(first_anonymous, "s", "Student")),
            &["First"],
        );
        let query = linq::select(second_let, lambda(&t1, Arc::clone(&first)));

        let model = parse(&query).unwrap();
        let let_names: Vec<_> = model
            .body_clauses
            .iter()
            .map(|clause| clause.as_from_clause().unwrap().identifier().name.clone())
            .collect();
        assert_eq!(let_names, vec!["f", "l"]);

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &first, &mut context, ClauseKind::Select).unwrap();
        assert!(field.source_path.joins.is_empty());
        assert_eq!(field.column.unwrap().to_string(), "s.FirstColumn");
    }

    fn linq_member(declaring: &str, name: &str, type_name: &str) -> linqsql::MemberInfo {
        linqsql::MemberInfo::new(declaring, name, type_name)
    }

    #[test]
    fn test_order_by_relation_is_rejected() {
        let schema = school_schema();
        let sd = param("sd", "StudentDetail");
        let key = path(&Expr::parameter_from(&sd), &["Student"]);
        let query = linq::select(
            linq::order_by(student_details(), lambda(&sd, Arc::clone(&key))),
            lambda(&sd, Expr::parameter_from(&sd)),
        );
        let model = parse(&query).unwrap();

        let mut context = JoinedTableContext::new();
        let result = resolve_field(&schema, &model, &key, &mut context, ClauseKind::OrderBy);
        assert!(matches!(
            result,
            Err(ResolveError::NotSupported(
                NotSupportedError::OrderingByRelation { .. }
            ))
        ));
    }

    fn sector_detail_query(sector: &ParameterExpr) -> (Arc<QueryModel>, Arc<Expr>) {
        let detail = path(&Expr::parameter_from(sector), &["StudentDetail"]);
        let query = linq::select(
            linq::order_by(industrial_sectors(), lambda(sector, Arc::clone(&detail))),
            lambda(sector, Expr::parameter_from(sector)),
        );
        (parse(&query).unwrap(), detail)
    }

    /// from sec in IndustrialSectors orderby sec.StudentDetail select sec
    #[test]
    fn test_order_by_virtual_relation_is_rejected() {
        let schema = school_schema();
        let sec = param("sec", "IndustrialSector");
        let (model, detail) = sector_detail_query(&sec);

        let mut context = JoinedTableContext::new();
        let result = resolve_field(&schema, &model, &detail, &mut context, ClauseKind::OrderBy);
        assert!(matches!(
            result,
            Err(ResolveError::NotSupported(
                NotSupportedError::OrderingByRelation { .. }
            ))
        ));
        assert_eq!(context.count(), 0);
    }

    /// where sec.StudentDetail == ... compares the joined detail's primary key.
    #[test]
    fn test_where_on_virtual_relation_joins_target_table() {
        let schema = school_schema();
        let sec = param("sec", "IndustrialSector");
        let (model, detail) = sector_detail_query(&sec);

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &detail, &mut context, ClauseKind::Where).unwrap();

        assert_eq!(field.source_path.joins.len(), 1);
        let join = &field.source_path.joins[0];
        assert_eq!(table_of(&join.left_column.source), ("industrialTable", Some("sec")));
        assert_eq!(join.left_column.name.as_deref(), Some("IDColumn"));
        assert_eq!(
            join.right_column.name.as_deref(),
            Some("Student_Detail_to_IndustrialSector_FK")
        );

        let column = field.column.as_ref().unwrap();
        assert_eq!(column.name.as_deref(), Some("IDColumn"));
        assert!(column.source.is_same_instance(&join.right_column.source));

        context.finalize_aliases(&model);
        assert_eq!(table_of(&column.source), ("detailTable", Some("j0")));
        assert_eq!(
            field.to_string(),
            "j0.IDColumn via [sec.IDColumn = j0.Student_Detail_to_IndustrialSector_FK]"
        );
    }

    #[test]
    fn test_unmapped_member_has_no_column() {
        let schema = school_schema();
        let s = param("s", "Student");
        let reference = path(&Expr::parameter_from(&s), &["Nickname"]);
        let query = linq::select(students(), lambda(&s, Arc::clone(&reference)));
        let model = parse(&query).unwrap();

        let mut context = JoinedTableContext::new();
        let field =
            resolve_field(&schema, &model, &reference, &mut context, ClauseKind::Select).unwrap();
        assert!(!field.is_mapped());
        assert_eq!(field.member.unwrap().name, "Nickname");
    }
}
