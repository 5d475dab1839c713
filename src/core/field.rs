//! Field descriptors and typed field values

use crate::core::entity::Record;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Declared type of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Text,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Long,
    Boolean,
    Decimal,
    Timestamp,
    /// Any JSON value, stored as received
    Json,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Text => "text",
            ScalarType::Integer => "integer",
            ScalarType::Long => "long",
            ScalarType::Boolean => "boolean",
            ScalarType::Decimal => "decimal",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Json => "json",
        }
    }
}

/// How a field is bound and stored
///
/// Relationship variants carry the canonical type name of the related entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain value column
    Scalar(ScalarType),

    /// One-to-one: the related record belongs to this one. Removing the owner
    /// removes the related record, and no two owners may share it.
    ToOneOwning(String),

    /// Many-to-one: a plain reference to a record owned elsewhere
    ToOneReferencing(String),

    /// One-to-many (`cascade: true`) or many-to-many (`cascade: false`)
    ToMany { target: String, cascade: bool },
}

impl FieldKind {
    pub fn is_relationship(&self) -> bool {
        !matches!(self, FieldKind::Scalar(_))
    }

    pub fn is_to_one(&self) -> bool {
        matches!(
            self,
            FieldKind::ToOneOwning(_) | FieldKind::ToOneReferencing(_)
        )
    }

    /// Related entity type, if this is a relationship
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldKind::Scalar(_) => None,
            FieldKind::ToOneOwning(target) | FieldKind::ToOneReferencing(target) => Some(target),
            FieldKind::ToMany { target, .. } => Some(target),
        }
    }

    /// Short label used in introspection output
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Scalar(_) => "scalar",
            FieldKind::ToOneOwning(_) => "one-to-one",
            FieldKind::ToOneReferencing(_) => "many-to-one",
            FieldKind::ToMany { cascade: true, .. } => "one-to-many",
            FieldKind::ToMany { cascade: false, .. } => "many-to-many",
        }
    }
}

/// Metadata for one entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub unique: bool,
    pub nullable: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            unique: false,
            nullable: true,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldKind::Scalar(scalar))
    }

    /// Mark the field as unique across all records of its entity type
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the field as mandatory at flush time
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A typed field value held by a [`Record`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i32),
    Long(i64),
    Boolean(bool),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
    Json(Value),
    /// To-one relationship
    One(Option<Box<Record>>),
    /// To-many relationship, in payload order
    Many(Vec<Record>),
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an i64 if it is any integral variant
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(i64::from(*i)),
            FieldValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            FieldValue::One(Some(record)) => Some(record),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            FieldValue::Many(records) => Some(records),
            _ => None,
        }
    }

    /// Null, an empty to-one, or an explicit JSON null
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            FieldValue::Null | FieldValue::One(None) | FieldValue::Json(Value::Null)
        )
    }

    /// Render a scalar value as JSON
    ///
    /// Relationship variants render as `null` here; records render their
    /// relationships themselves so identity exposure stays consistent.
    pub fn scalar_json(&self) -> Value {
        match self {
            FieldValue::Null | FieldValue::One(_) | FieldValue::Many(_) => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Long(l) => Value::from(*l),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Decimal(d) => decimal_json(d),
            FieldValue::Timestamp(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

/// A decimal as a JSON number when a double holds it exactly, else as its
/// exact string form
fn decimal_json(d: &Decimal) -> Value {
    d.to_f64()
        .filter(|f| Decimal::from_str(&f.to_string()).is_ok_and(|back| back == *d))
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}
