//! Mapping between the object model and database tables.
//!
//! The resolver never reads a configuration directly; it asks a
//! [`SchemaProvider`] which table stores a type, which column stores a member
//! and how a relation member joins two tables. [`MappingSchema`] is the
//! provider loaded from a YAML or JSON description.

use crate::expression::MemberInfo;

pub mod errors;
pub mod mapping;

pub use errors::SchemaError;
pub use mapping::{EntityMapping, MappingSchema, RelationMapping};

/// How a relation member joins its declaring table to the target table:
/// `left_column` (on the declaring table) `=` `right_column` (on the target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub target_type: String,
    pub target_table: String,
    pub left_column: String,
    pub right_column: String,
    /// Virtual relations are stored on the target side (one-to-many); the
    /// declaring table has no foreign-key column for them.
    pub is_virtual: bool,
}

pub trait SchemaProvider: Send + Sync {
    /// Table storing entities of `type_name`.
    fn table_name(&self, type_name: &str) -> Option<String>;

    /// Column storing `member`. A non-virtual relation member maps to its
    /// foreign-key column; virtual relations and unknown members have none.
    fn column_name(&self, member: &MemberInfo) -> Option<String>;

    /// Join description for a relation member, `None` if `member` is not a relation.
    fn relation(&self, member: &MemberInfo) -> Option<RelationInfo>;

    /// Primary-key member of `type_name`.
    fn primary_key_member(&self, type_name: &str) -> Option<MemberInfo>;

    fn is_relation(&self, member: &MemberInfo) -> bool {
        self.relation(member).is_some()
    }
}
