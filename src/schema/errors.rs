//! Errors raised while loading or validating a mapping schema.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Failed to read mapping schema: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse mapping schema: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid mapping schema: {message}")]
    InvalidConfig { message: String },
    #[error("Entity '{entity}' declares relation '{relation}' to unknown entity '{target}'")]
    UnknownRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },
    #[error("Entity '{entity}' has no column mapping for its primary key '{primary_key}'")]
    UnmappedPrimaryKey { entity: String, primary_key: String },
}

impl SchemaError {
    pub fn invalid_config_with_context(path: &str, message: &str) -> Self {
        SchemaError::InvalidConfig {
            message: format!("'{}': {}", path, message),
        }
    }
}
