//! Field resolution: maps member chains in clause expressions to table
//! columns, creating the joins needed to reach them.
//!
//! A resolution session is one [`JoinedTableContext`] shared by every call
//! made for the same query; it keeps joined tables unique and assigns their
//! aliases at the end through [`JoinedTableContext::finalize_aliases`].

use std::sync::Arc;

use crate::{expression::Expr, query_model::QueryModel, schema::SchemaProvider};

pub mod clause_resolver;
pub mod errors;
pub mod join_context;
pub mod model_resolver;
pub mod path_builder;
pub mod policy;
pub mod types;

pub use clause_resolver::ClauseFieldResolver;
pub use errors::{FieldAccessResolveError, NotSupportedError, ResolveError, ResolveResult};
pub use join_context::JoinedTableContext;
pub use model_resolver::QueryModelFieldResolver;
pub use policy::{ClauseKind, FieldAccessPolicy};
pub use types::{Column, ColumnSource, FieldDescriptor, FieldSourcePath, SingleJoin, Table};

/// Resolves `expr`, a reference appearing in a clause of kind `clause_kind`
/// somewhere in `model`, using that clause kind's policy.
pub fn resolve_field(
    provider: &dyn SchemaProvider,
    model: &QueryModel,
    expr: &Arc<Expr>,
    context: &mut JoinedTableContext,
    clause_kind: ClauseKind,
) -> ResolveResult<FieldDescriptor> {
    QueryModelFieldResolver::new(provider).resolve_field(model, expr, context, clause_kind.policy())
}
