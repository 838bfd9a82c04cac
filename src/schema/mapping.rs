//! Mapping schema configuration.
//!
//! Loads entity-to-table mappings from YAML or JSON:
//!
//! ```yaml
//! entities:
//!   Student:
//!     table: studentTable
//!     primary_key: ID
//!     columns:
//!       ID: IDColumn
//!       First: FirstColumn
//!     relations:
//!       Details:
//!         target: StudentDetail
//!         foreign_key: Student_Detail_to_Student_FK
//!         virtual: true
//! ```
//!
//! A non-virtual relation keeps its foreign key on the declaring table; a
//! virtual one is the inverse side, whose foreign key lives on the target.
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use super::{errors::SchemaError, RelationInfo, SchemaProvider};
use crate::{config::ResolverConfig, expression::MemberInfo};

fn default_key_type() -> String {
    "Int32".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationMapping {
    pub target: String,
    pub foreign_key: String,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityMapping {
    pub table: String,
    pub primary_key: String,
    #[serde(default = "default_key_type")]
    pub primary_key_type: String,
    #[serde(default)]
    pub columns: HashMap<String, String>,
    #[serde(default)]
    pub relations: HashMap<String, RelationMapping>,
}

impl EntityMapping {
    fn primary_key_column(&self) -> Option<&str> {
        self.columns.get(&self.primary_key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MappingSchema {
    #[serde(default)]
    pub entities: HashMap<String, EntityMapping>,
}

impl MappingSchema {
    /// Load a mapping schema from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path).map_err(|e| SchemaError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse a mapping schema from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        let schema: MappingSchema =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::ConfigParseError {
                error: e.to_string(),
            })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Parse a mapping schema from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: MappingSchema =
            serde_json::from_str(json).map_err(|e| SchemaError::ConfigParseError {
                error: e.to_string(),
            })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load the schema named by `config.schema_path`. `.json` files are read
    /// as JSON, anything else as YAML.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, SchemaError> {
        let path = config
            .schema_path
            .as_deref()
            .ok_or_else(|| SchemaError::InvalidConfig {
                message: "no schema path configured".to_string(),
            })?;
        log::info!("Loading mapping schema from {}", path);

        if path.ends_with(".json") {
            let contents = fs::read_to_string(path).map_err(|e| SchemaError::ConfigReadError {
                error: e.to_string(),
            })?;
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Structural validation: every relation targets a known entity and every
    /// primary key has a column.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.entities.is_empty() {
            return Err(SchemaError::InvalidConfig {
                message: "Schema must contain at least one entity".to_string(),
            });
        }

        for (name, entity) in &self.entities {
            if entity.table.trim().is_empty() {
                return Err(SchemaError::invalid_config_with_context(
                    name,
                    "table name must not be empty",
                ));
            }
            if entity.primary_key_column().is_none() {
                return Err(SchemaError::UnmappedPrimaryKey {
                    entity: name.clone(),
                    primary_key: entity.primary_key.clone(),
                });
            }
            for (relation_name, relation) in &entity.relations {
                if !self.entities.contains_key(&relation.target) {
                    return Err(SchemaError::UnknownRelationTarget {
                        entity: name.clone(),
                        relation: relation_name.clone(),
                        target: relation.target.clone(),
                    });
                }
                if entity.columns.contains_key(relation_name) {
                    return Err(SchemaError::invalid_config_with_context(
                        name,
                        &format!("'{}' is mapped both as column and relation", relation_name),
                    ));
                }
            }
        }

        log::debug!("Mapping schema validated: {} entities", self.entities.len());
        Ok(())
    }
}

impl SchemaProvider for MappingSchema {
    fn table_name(&self, type_name: &str) -> Option<String> {
        self.entities.get(type_name).map(|e| e.table.clone())
    }

    fn column_name(&self, member: &MemberInfo) -> Option<String> {
        let entity = self.entities.get(&member.declaring_type)?;
        if let Some(column) = entity.columns.get(&member.name) {
            return Some(column.clone());
        }
        entity
            .relations
            .get(&member.name)
            .filter(|relation| !relation.is_virtual)
            .map(|relation| relation.foreign_key.clone())
    }

    fn relation(&self, member: &MemberInfo) -> Option<RelationInfo> {
        let entity = self.entities.get(&member.declaring_type)?;
        let relation = entity.relations.get(&member.name)?;
        let target = self.entities.get(&relation.target)?;

        let (left_column, right_column) = if relation.is_virtual {
            (
                entity.primary_key_column()?.to_string(),
                relation.foreign_key.clone(),
            )
        } else {
            (
                relation.foreign_key.clone(),
                target.primary_key_column()?.to_string(),
            )
        };

        Some(RelationInfo {
            target_type: relation.target.clone(),
            target_table: target.table.clone(),
            left_column,
            right_column,
            is_virtual: relation.is_virtual,
        })
    }

    fn primary_key_member(&self, type_name: &str) -> Option<MemberInfo> {
        let entity = self.entities.get(type_name)?;
        Some(MemberInfo::new(
            type_name,
            entity.primary_key.clone(),
            entity.primary_key_type.clone(),
        ))
    }
}
