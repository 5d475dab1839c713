//! Entity catalog: the registry of every exposed entity type
//!
//! The catalog is built once at startup and shared behind an `Arc`. Building
//! it flattens each type's inheritance chain, so lookups at request time
//! never walk parents.

use crate::core::entity::EntityDescriptor;
use crate::core::field::{FieldDescriptor, FieldKind};
use crate::core::naming::EntityNaming;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building a catalog
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("entity type '{0}' is registered twice")]
    DuplicateEntity(String),

    #[error("entity type '{entity}' extends unknown type '{parent}'")]
    UnknownParent { entity: String, parent: String },

    #[error("entity type '{entity}' has an inheritance cycle")]
    InheritanceCycle { entity: String },

    #[error("field '{entity}.{field}' targets unknown type '{target}'")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("entity types '{first}' and '{second}' share the URL name '{url_name}'")]
    UrlNameClash {
        first: String,
        second: String,
        url_name: String,
    },
}

/// Immutable registry of flattened entity descriptors
///
/// ```
/// use entity_rest::core::catalog::EntityCatalog;
/// use entity_rest::core::entity::EntityDescriptor;
/// use entity_rest::core::field::ScalarType;
///
/// let catalog = EntityCatalog::builder()
///     .register(EntityDescriptor::new("AddOnLevel").scalar("name", ScalarType::Text))
///     .build()
///     .unwrap();
///
/// assert_eq!(catalog.resolve("add-on-level").unwrap().name, "AddOnLevel");
/// assert_eq!(catalog.canonical_name("AddOnLevel").as_deref(), Some("add-on-level"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    /// Flattened descriptors keyed by canonical type name, in registration order
    entities: IndexMap<String, EntityDescriptor>,

    /// Lowercased URL name -> canonical type name, concrete types only
    by_url: HashMap<String, String>,
}

impl EntityCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Find the concrete entity type exposed under a URL segment
    ///
    /// Matching is case-insensitive; abstract types are never returned.
    pub fn resolve(&self, segment: &str) -> Option<&EntityDescriptor> {
        let key = EntityNaming::normalize_segment(segment);
        self.by_url
            .get(&key)
            .and_then(|name| self.entities.get(name))
    }

    /// URL name of a registered type
    pub fn canonical_name(&self, type_name: &str) -> Option<String> {
        self.entities.get(type_name).map(|d| d.url_name())
    }

    /// Flattened descriptor of a registered type, abstract or not
    pub fn get(&self, type_name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(type_name)
    }

    /// Names of all exposed (concrete) types
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities
            .values()
            .filter(|d| !d.is_abstract)
            .map(|d| d.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Introspection document for the exposed types
    pub fn describe(&self, base_path: &str) -> Vec<EntityShape> {
        self.entities
            .values()
            .filter(|d| !d.is_abstract)
            .map(|d| EntityShape {
                name: d.name.clone(),
                path: format!("{}/{}", base_path.trim_end_matches('/'), d.url_name()),
                parent: d.parent.clone(),
                fields: d.fields.iter().map(FieldShape::from).collect(),
            })
            .collect()
    }
}

/// Introspection view of one entity type
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntityShape {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub fields: Vec<FieldShape>,
}

/// Introspection view of one field
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub kind: &'static str,
    #[serde(rename = "type")]
    pub type_name: String,
    pub unique: bool,
    pub nullable: bool,
}

impl From<&FieldDescriptor> for FieldShape {
    fn from(field: &FieldDescriptor) -> Self {
        let type_name = match &field.kind {
            FieldKind::Scalar(scalar) => scalar.name().to_string(),
            other => other.target().unwrap_or_default().to_string(),
        };
        Self {
            name: field.name.clone(),
            kind: field.kind.label(),
            type_name,
            unique: field.unique,
            nullable: field.nullable,
        }
    }
}

/// Collects descriptors, then validates and flattens them into a catalog
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    declared: Vec<EntityDescriptor>,
}

impl CatalogBuilder {
    pub fn register(mut self, descriptor: EntityDescriptor) -> Self {
        self.declared.push(descriptor);
        self
    }

    pub fn register_all(mut self, descriptors: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        self.declared.extend(descriptors);
        self
    }

    /// Validate references and flatten inheritance
    ///
    /// Registration order does not matter: a subtype may be registered before
    /// its parent.
    pub fn build(self) -> Result<EntityCatalog, CatalogError> {
        let mut declared: IndexMap<String, EntityDescriptor> = IndexMap::new();
        for descriptor in self.declared {
            if declared.contains_key(&descriptor.name) {
                return Err(CatalogError::DuplicateEntity(descriptor.name));
            }
            declared.insert(descriptor.name.clone(), descriptor);
        }

        let mut entities = IndexMap::new();
        for name in declared.keys() {
            let fields = flatten(name, &declared)?;
            let mut flat = declared[name].clone();
            flat.fields = fields;
            entities.insert(name.clone(), flat);
        }

        for descriptor in entities.values() {
            for field in descriptor.relationships() {
                let target = field.kind.target().unwrap_or_default();
                let known = entities.get(target).is_some_and(|t| !t.is_abstract);
                if !known {
                    return Err(CatalogError::UnknownTarget {
                        entity: descriptor.name.clone(),
                        field: field.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let mut by_url: HashMap<String, String> = HashMap::new();
        for descriptor in entities.values().filter(|d| !d.is_abstract) {
            let url_name = EntityNaming::normalize_segment(&descriptor.url_name());
            if let Some(first) = by_url.get(&url_name) {
                return Err(CatalogError::UrlNameClash {
                    first: first.clone(),
                    second: descriptor.name.clone(),
                    url_name,
                });
            }
            by_url.insert(url_name, descriptor.name.clone());
        }

        tracing::debug!("Entity catalog built with {} types", entities.len());
        Ok(EntityCatalog { entities, by_url })
    }
}

/// Fields of `name` with inherited fields first
///
/// A field re-declared by a subtype replaces the inherited one in place.
fn flatten(
    name: &str,
    declared: &IndexMap<String, EntityDescriptor>,
) -> Result<Vec<FieldDescriptor>, CatalogError> {
    let mut chain = Vec::new();
    let mut current = name;
    loop {
        if chain.contains(&current) {
            return Err(CatalogError::InheritanceCycle {
                entity: name.to_string(),
            });
        }
        chain.push(current);
        let descriptor = &declared[current];
        match &descriptor.parent {
            None => break,
            Some(parent) => {
                if !declared.contains_key(parent) {
                    return Err(CatalogError::UnknownParent {
                        entity: current.to_string(),
                        parent: parent.clone(),
                    });
                }
                current = parent.as_str();
            }
        }
    }

    let mut fields: Vec<FieldDescriptor> = Vec::new();
    for ancestor in chain.iter().rev() {
        for field in &declared[*ancestor].fields {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(slot) => *slot = field.clone(),
                None => fields.push(field.clone()),
            }
        }
    }
    Ok(fields)
}
