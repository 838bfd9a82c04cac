//! Shared unit-test fixtures.

use crate::{expression::MemberInfo, schema::MappingSchema};

pub const SCHOOL_SCHEMA_YAML: &str = include_str!("../tests/fixtures/school_schema.yaml");

pub fn school_schema() -> MappingSchema {
    MappingSchema::from_yaml_str(SCHOOL_SCHEMA_YAML).expect("fixture schema is valid")
}

fn member_type(declaring_type: &str, name: &str) -> &'static str {
    match (declaring_type, name) {
        (_, "ID") | ("Order", "StudentID") => "Int32",
        ("Student", "Details") => "IEnumerable<StudentDetail>",
        ("Student", "Orders") => "IEnumerable<Order>",
        ("StudentDetail", "Student") => "Student",
        ("StudentDetail", "IndustrialSector") => "IndustrialSector",
        _ => "String",
    }
}

pub fn student_member(name: &str) -> MemberInfo {
    MemberInfo::new("Student", name, member_type("Student", name))
}

pub fn detail_member(name: &str) -> MemberInfo {
    MemberInfo::new("StudentDetail", name, member_type("StudentDetail", name))
}
