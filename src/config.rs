use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Alias prefix used when none is configured: joined tables become `j0`, `j1`, ...
pub const DEFAULT_ALIAS_PREFIX: &str = "j";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Resolver configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Prefix of the aliases generated for joined tables
    #[validate(
        length(min = 1, max = 16, message = "Alias prefix must be 1 to 16 characters"),
        custom(function = "validate_alias_prefix")
    )]
    pub alias_prefix: String,

    /// Mapping schema file (YAML, or JSON when the name ends in `.json`)
    pub schema_path: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
            schema_path: None,
        }
    }
}

impl ResolverConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            alias_prefix: optional_env("LINQSQL_ALIAS_PREFIX")?
                .unwrap_or_else(|| DEFAULT_ALIAS_PREFIX.to_string()),
            schema_path: optional_env("LINQSQL_SCHEMA_PATH")?,
        };

        config.validate()?;
        log::debug!("Resolver configuration from environment: {:?}", config);
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content.to_string(),
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Aliases end up in SQL, so the prefix must be a plain identifier start.
/// Unset variables are `None`; set but non-unicode ones are an error.
fn optional_env(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn validate_alias_prefix(prefix: &str) -> Result<(), ValidationError> {
    let mut chars = prefix.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        let mut error = ValidationError::new("alias_prefix");
        error.message = Some("Alias prefix must be an identifier (letters, digits, '_')".into());
        Err(error)
    }
}
