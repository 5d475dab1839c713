//! Configuration loading and management
//!
//! An [`AppConfig`] describes the server, the binding mode, the entity
//! types to expose and the static records to seed:
//!
//! ```yaml
//! server:
//!   bind: "127.0.0.1:8080"
//!   base_path: /rest
//! binding:
//!   identifiers: uuid
//! entities:
//!   - name: Item
//!     fields:
//!       - { name: code, type: text, unique: true }
//!       - { name: price, type: decimal }
//!   - name: Line
//!     fields:
//!       - { name: quantity, type: integer }
//!       - { name: item, relation: many-to-one, target: Item }
//! seeds:
//!   - entity: Item
//!     uuid: 3f1c9a52-0000-4000-8000-000000000001
//!     values: { code: STD, price: 10 }
//! ```

use crate::core::entity::EntityDescriptor;
use crate::core::field::{FieldDescriptor, FieldKind, ScalarType};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors in the entity section of a configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field '{entity}.{field}' must declare either a type or a relation")]
    MissingKind { entity: String, field: String },

    #[error("field '{entity}.{field}' declares both a type and a relation")]
    AmbiguousKind { entity: String, field: String },

    #[error("relation '{entity}.{field}' has no target")]
    MissingTarget { entity: String, field: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub binding: BindingConfig,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,

    #[serde(default)]
    pub seeds: Vec<SeedConfig>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Path prefix for the entity routes
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_path: default_base_path(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_base_path() -> String {
    "/rest".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingConfig {
    #[serde(default)]
    pub identifiers: IdentifierMode,
}

/// How records are addressed in URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierMode {
    /// By public UUID; the numeric identity is never rendered
    #[default]
    Uuid,
    /// By numeric identity, which is also rendered as `id`
    Identity,
}

impl IdentifierMode {
    pub fn exposes_identity(&self) -> bool {
        matches!(self, IdentifierMode::Identity)
    }
}

/// Declaration of one entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// Declaration of one field
///
/// Exactly one of `type` and `relation` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub scalar: Option<ScalarType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub unique: bool,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Overrides the cascade default of to-many relations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade: Option<bool>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// A static record created once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Canonical type name
    pub entity: String,

    /// Fixed UUID that makes seeding idempotent
    pub uuid: String,

    #[serde(default)]
    pub values: Map<String, Value>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Convert the entity section into descriptors
    pub fn descriptors(&self) -> Result<Vec<EntityDescriptor>, ConfigError> {
        self.entities.iter().map(EntityConfig::descriptor).collect()
    }
}

impl EntityConfig {
    pub fn descriptor(&self) -> Result<EntityDescriptor, ConfigError> {
        let mut descriptor = EntityDescriptor::new(&self.name);
        descriptor.parent = self.extends.clone();
        descriptor.is_abstract = self.is_abstract;
        for field in &self.fields {
            descriptor = descriptor.field(field.descriptor(&self.name)?);
        }
        Ok(descriptor)
    }
}

impl FieldConfig {
    fn descriptor(&self, entity: &str) -> Result<FieldDescriptor, ConfigError> {
        let kind = match (self.scalar, self.relation) {
            (Some(scalar), None) => FieldKind::Scalar(scalar),
            (None, Some(relation)) => {
                let target = self.target.clone().ok_or_else(|| ConfigError::MissingTarget {
                    entity: entity.to_string(),
                    field: self.name.clone(),
                })?;
                match relation {
                    RelationKind::OneToOne => FieldKind::ToOneOwning(target),
                    RelationKind::ManyToOne => FieldKind::ToOneReferencing(target),
                    RelationKind::OneToMany => FieldKind::ToMany {
                        target,
                        cascade: self.cascade.unwrap_or(true),
                    },
                    RelationKind::ManyToMany => FieldKind::ToMany {
                        target,
                        cascade: self.cascade.unwrap_or(false),
                    },
                }
            }
            (None, None) => {
                return Err(ConfigError::MissingKind {
                    entity: entity.to_string(),
                    field: self.name.clone(),
                });
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::AmbiguousKind {
                    entity: entity.to_string(),
                    field: self.name.clone(),
                });
            }
        };

        let mut field = FieldDescriptor::new(&self.name, kind);
        field.unique = self.unique;
        field.nullable = self.nullable;
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
server:
  bind: "0.0.0.0:9000"
binding:
  identifiers: identity
entities:
  - name: Named
    abstract: true
    fields:
      - { name: name, type: text, nullable: false }
  - name: AddOnLevel
    extends: Named
    fields:
      - { name: price, type: decimal }
  - name: Quote
    fields:
      - { name: levels, relation: many-to-many, target: AddOnLevel }
      - { name: lines, relation: one-to-many, target: AddOnLevel, cascade: false }
seeds:
  - entity: AddOnLevel
    uuid: seed-1
    values: { name: Basic, price: 5 }
"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.base_path, "/rest");
        assert_eq!(config.binding.identifiers, IdentifierMode::Uuid);
        assert!(config.entities.is_empty());
    }

    #[test]
    fn test_entities_and_seeds() {
        let config = AppConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.base_path, "/rest");
        assert!(config.binding.identifiers.exposes_identity());

        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors.len(), 3);
        assert!(descriptors[0].is_abstract);
        assert!(!descriptors[0].fields[0].nullable);
        assert_eq!(descriptors[1].parent.as_deref(), Some("Named"));

        let quote = &descriptors[2];
        assert_eq!(
            quote.fields[0].kind,
            FieldKind::ToMany {
                target: "AddOnLevel".to_string(),
                cascade: false
            }
        );
        assert_eq!(
            quote.fields[1].kind,
            FieldKind::ToMany {
                target: "AddOnLevel".to_string(),
                cascade: false
            }
        );

        assert_eq!(config.seeds[0].uuid, "seed-1");
        assert_eq!(config.seeds[0].values["name"], "Basic");
    }

    #[test]
    fn test_field_needs_exactly_one_kind() {
        let config = AppConfig::from_yaml_str(
            r#"
entities:
  - name: Item
    fields:
      - { name: code }
"#,
        )
        .unwrap();
        assert!(matches!(
            config.descriptors(),
            Err(ConfigError::MissingKind { .. })
        ));

        let config = AppConfig::from_yaml_str(
            r#"
entities:
  - name: Item
    fields:
      - { name: owner, relation: many-to-one }
"#,
        )
        .unwrap();
        assert!(matches!(
            config.descriptors(),
            Err(ConfigError::MissingTarget { .. })
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = AppConfig::from_yaml_str(YAML).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = AppConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.entities.len(), config.entities.len());
        assert_eq!(parsed.seeds.len(), 1);
    }
}
