//! Loading the mapping schema through the resolver configuration.

#[cfg(test)]
mod schema_config_integration_tests {
    use std::io::Write;

    use linqsql::{
        expression::{builders::linq, Expr},
        parse, resolve_field, ClauseKind, JoinedTableContext, MappingSchema, ResolverConfig,
        SchemaError, SchemaProvider,
    };

    use crate::common::*;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_schema_from_configured_yaml_path() {
        let schema_file = write_temp(".yaml", SCHOOL_SCHEMA_YAML);
        let config_yaml = format!(
            "alias_prefix: join_\nschema_path: {}\n",
            schema_file.path().display()
        );
        let config = ResolverConfig::from_yaml_str(&config_yaml).unwrap();
        let schema = MappingSchema::from_config(&config).unwrap();
        assert_eq!(schema.table_name("Order").as_deref(), Some("orderTable"));

        let sd = param("sd", "StudentDetail");
        let reference = path(&Expr::parameter_from(&sd), &["Student", "Last"]);
        let query = linq::select(student_details(), lambda(&sd, reference.clone()));
        let model = parse(&query).unwrap();

        let mut context = JoinedTableContext::from_config(&config);
        let field =
            resolve_field(&schema, &model, &reference, &mut context, ClauseKind::Select).unwrap();
        context.finalize_aliases(&model);
        assert_eq!(field.column.unwrap().to_string(), "join_0.LastColumn");
    }

    #[test]
    fn test_schema_from_configured_json_path() {
        let json = r#"{
            "entities": {
                "Student": {
                    "table": "studentTable",
                    "primary_key": "ID",
                    "columns": { "ID": "IDColumn", "First": "FirstColumn" }
                }
            }
        }"#;
        let schema_file = write_temp(".json", json);
        let config = ResolverConfig {
            schema_path: Some(schema_file.path().display().to_string()),
            ..ResolverConfig::default()
        };
        let schema = MappingSchema::from_config(&config).unwrap();
        assert_eq!(schema.table_name("Student").as_deref(), Some("studentTable"));
        assert_eq!(schema.table_name("StudentDetail"), None);
    }

    #[test]
    fn test_missing_schema_path() {
        let config = ResolverConfig::default();
        assert!(matches!(
            MappingSchema::from_config(&config),
            Err(SchemaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unreadable_schema_file() {
        let config = ResolverConfig {
            schema_path: Some("/nonexistent/school_schema.yaml".to_string()),
            ..ResolverConfig::default()
        };
        assert!(matches!(
            MappingSchema::from_config(&config),
            Err(SchemaError::ConfigReadError { .. })
        ));
    }

    #[test]
    fn test_relation_to_unknown_entity_is_rejected() {
        let yaml = r#"
entities:
  Student:
    table: studentTable
    primary_key: ID
    columns:
      ID: IDColumn
    relations:
      Details:
        target: StudentDetail
        foreign_key: Student_Detail_to_Student_FK
        virtual: true
"#;
        assert!(matches!(
            MappingSchema::from_yaml_str(yaml),
            Err(SchemaError::UnknownRelationTarget { .. })
        ));
    }
}
