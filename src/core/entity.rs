//! Entity descriptors and records
//!
//! An [`EntityDescriptor`] is the registered shape of an entity type. A
//! [`Record`] is one instance of that type: system-managed identifiers and
//! timestamps plus a map of typed [`FieldValue`]s.

use crate::core::field::{FieldDescriptor, FieldKind, FieldValue, ScalarType};
use crate::core::naming::EntityNaming;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Surrogate numeric identity key
pub const IDENTITY_KEY: &str = "id";
/// Public UUID key
pub const UUID_KEY: &str = "uuid";
/// Creation timestamp key
pub const CREATED_AT_KEY: &str = "createdAt";
/// Last update timestamp key
pub const UPDATED_AT_KEY: &str = "updatedAt";

/// Keys managed by the store. Never bound from a payload.
pub const SYSTEM_KEYS: [&str; 4] = [IDENTITY_KEY, UUID_KEY, CREATED_AT_KEY, UPDATED_AT_KEY];

/// Check whether a key names a system-managed field
pub fn is_system_key(key: &str) -> bool {
    SYSTEM_KEYS.contains(&key)
}

/// Registered shape of an entity type
///
/// Built with a fluent API:
///
/// ```
/// use entity_rest::core::entity::EntityDescriptor;
/// use entity_rest::core::field::ScalarType;
///
/// let line = EntityDescriptor::new("Line")
///     .scalar("quantity", ScalarType::Integer)
///     .many_to_one("item", "Item");
///
/// assert_eq!(line.url_name(), "line");
/// assert_eq!(line.fields.len(), 2);
/// ```
///
/// Once registered in the catalog, `fields` holds the flattened field list,
/// inherited fields included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Canonical PascalCase type name
    pub name: String,

    /// Type this one inherits fields from
    pub parent: Option<String>,

    /// Abstract types contribute fields to subtypes but are never exposed
    pub is_abstract: bool,

    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            fields: Vec::new(),
        }
    }

    /// Inherit the fields of another registered type
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn scalar(self, name: &str, scalar: ScalarType) -> Self {
        self.field(FieldDescriptor::scalar(name, scalar))
    }

    pub fn one_to_one(self, name: &str, target: &str) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldKind::ToOneOwning(target.to_string()),
        ))
    }

    pub fn many_to_one(self, name: &str, target: &str) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldKind::ToOneReferencing(target.to_string()),
        ))
    }

    pub fn one_to_many(self, name: &str, target: &str) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldKind::ToMany {
                target: target.to_string(),
                cascade: true,
            },
        ))
    }

    pub fn many_to_many(self, name: &str, target: &str) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldKind::ToMany {
                target: target.to_string(),
                cascade: false,
            },
        ))
    }

    /// Kebab-case name used in URLs
    pub fn url_name(&self) -> String {
        EntityNaming::url_name(&self.name)
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that hold relationships
    pub fn relationships(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.kind.is_relationship())
    }
}

/// One instance of an entity type
///
/// A record only holds the fields that were loaded or bound. A field missing
/// from the map is "not set" and is left alone when the record is merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    pub identity: Option<i64>,
    pub uuid: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    fields: IndexMap<String, FieldValue>,
    dirty: bool,
}

impl Record {
    /// An empty, never-persisted instance of `entity`
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            identity: None,
            uuid: None,
            created_at: None,
            updated_at: None,
            fields: IndexMap::new(),
            dirty: false,
        }
    }

    /// Reference to a stored record without any of its fields
    pub fn stub(entity: impl Into<String>, identity: i64, uuid: Option<String>) -> Self {
        let mut record = Self::new(entity);
        record.identity = Some(identity);
        record.uuid = uuid;
        record
    }

    /// Canonical type name of this record
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Assign a field and mark the record dirty
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
        self.dirty = true;
    }

    /// Assign a field as loaded from storage, without marking the record dirty
    pub fn load(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Never persisted
    pub fn is_new(&self) -> bool {
        self.identity.is_none()
    }

    /// Modified since it was loaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// JSON view of this record
    pub fn view(&self, expose_identity: bool) -> RecordView<'_> {
        RecordView {
            record: self,
            expose_identity,
        }
    }
}

/// Serializable view of a [`Record`]
///
/// Renders `uuid`, the fields in order, then the timestamps. The numeric
/// identity is only rendered when `expose_identity` is set. Timestamps are
/// omitted until the record has been stamped, so a cycle stub renders as
/// little more than its UUID.
pub struct RecordView<'a> {
    record: &'a Record,
    expose_identity: bool,
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.record;
        let mut map = serializer.serialize_map(None)?;
        if self.expose_identity {
            map.serialize_entry(IDENTITY_KEY, &record.identity)?;
        }
        map.serialize_entry(UUID_KEY, &record.uuid)?;
        for (name, value) in &record.fields {
            match value {
                FieldValue::One(Some(related)) => {
                    map.serialize_entry(name, &related.view(self.expose_identity))?
                }
                FieldValue::Many(related) => {
                    let views: Vec<_> = related
                        .iter()
                        .map(|r| r.view(self.expose_identity))
                        .collect();
                    map.serialize_entry(name, &views)?
                }
                other => map.serialize_entry(name, &other.scalar_json())?,
            }
        }
        if let Some(created_at) = record.created_at {
            map.serialize_entry(CREATED_AT_KEY, &render_instant(created_at))?;
        }
        if let Some(updated_at) = record.updated_at {
            map.serialize_entry(UPDATED_AT_KEY, &render_instant(updated_at))?;
        }
        map.end()
    }
}

fn render_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
