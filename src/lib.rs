//! linqsql - query model front end for LINQ-style operator chains
//!
//! This crate turns expression trees of chained query operators into a
//! structured query model and resolves field references to database columns:
//! - Expression tree, rewriting and partial evaluation (`expression`)
//! - Operator chain parsing into query models (`parser`, `query_model`)
//! - Entity-to-table mapping (`schema`)
//! - Field resolution with join inference and alias assignment (`resolver`)

pub mod config;
pub mod expression;
pub mod parser;
pub mod query_model;
pub mod resolver;
pub mod schema;
pub mod transformed;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ResolverConfig};
pub use expression::{Expr, MemberInfo, ParameterExpr};
pub use parser::{parse, ParseError};
pub use query_model::QueryModel;
pub use resolver::{resolve_field, ClauseKind, FieldDescriptor, JoinedTableContext, ResolveError};
pub use schema::{MappingSchema, SchemaError, SchemaProvider};

/// Initialize `env_logger` with `info` as the default level (`RUST_LOG`
/// overrides it). Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
