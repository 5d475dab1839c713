//! Relationship resolution
//!
//! Turns the raw value of a relationship field into related records. A
//! reference can be a bare UUID string, a bare numeric identity, a nested
//! object, or for to-many fields a list mixing all three. Nested objects
//! that reference an existing record are bound onto it, so a payload can
//! update related records in the same request.

use crate::binding::binder::{Candidate, EntityBinder};
use crate::binding::coerce::truncate;
use crate::core::entity::{IDENTITY_KEY, Record, UUID_KEY};
use crate::core::error::BindError;
use crate::core::field::{FieldDescriptor, FieldKind, FieldValue};
use crate::core::store::find_by_uuid;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

impl<'a> EntityBinder<'a> {
    /// Resolve a relationship candidate into a field value
    ///
    /// `Ok(None)` leaves the field untouched. That happens only when a
    /// numeric identity does not match any record.
    pub fn resolve<'s>(
        &'s mut self,
        field: &'a FieldDescriptor,
        candidate: Candidate<'s>,
    ) -> BoxFuture<'s, Result<Option<FieldValue>, BindError>> {
        async move {
            match (&field.kind, candidate) {
                (FieldKind::Scalar(_), _) => Err(BindError::Reflection {
                    entity_type: String::new(),
                    field: field.name.clone(),
                    message: "not a relationship".to_string(),
                }),
                (FieldKind::ToMany { target, .. }, Candidate::Own(raw)) => {
                    self.to_many(field, target, raw).await.map(Some)
                }
                (FieldKind::ToMany { .. }, Candidate::IdKey(_)) => Ok(None),
                (FieldKind::ToOneOwning(target) | FieldKind::ToOneReferencing(target), c) => {
                    let related = match c {
                        Candidate::Own(raw) => self.to_one(field, target, raw).await?,
                        Candidate::IdKey(raw) => self.to_one_by_id_key(field, target, raw).await?,
                    };
                    Ok(related.map(|r| FieldValue::One(Some(Box::new(r)))))
                }
            }
        }
        .boxed()
    }

    async fn to_one(
        &mut self,
        field: &FieldDescriptor,
        target: &str,
        raw: &Value,
    ) -> Result<Option<Record>, BindError> {
        match raw {
            Value::Object(map) => {
                if let Some(uuid) = map.get(UUID_KEY).filter(|v| !v.is_null()) {
                    let uuid = uuid_text(field, uuid)?;
                    let mut related = self.by_uuid(target, uuid).await?;
                    self.rebind(&mut related, map, target).await?;
                    Ok(Some(related))
                } else if let Some(id) = map.get(IDENTITY_KEY).filter(|v| !v.is_null()) {
                    let identity = identity_of(field, id)?;
                    Ok(self.uow.find(target, identity).await?)
                } else {
                    Err(BindError::format(&field.name, "reference with uuid or id", raw))
                }
            }
            Value::String(uuid) => self.by_uuid(target, uuid).await.map(Some),
            Value::Number(n) => Ok(self.uow.find(target, truncate(n)).await?),
            other => Err(BindError::format(&field.name, "reference", other)),
        }
    }

    /// `{field}Id` carries a UUID string or a raw identity
    async fn to_one_by_id_key(
        &mut self,
        field: &FieldDescriptor,
        target: &str,
        raw: &Value,
    ) -> Result<Option<Record>, BindError> {
        match raw {
            Value::String(uuid) => self.by_uuid(target, uuid).await.map(Some),
            other => {
                let identity = identity_of(field, other)?;
                Ok(self.uow.find(target, identity).await?)
            }
        }
    }

    /// Replaces the collection with the listed records, in payload order
    async fn to_many(
        &mut self,
        field: &FieldDescriptor,
        target: &str,
        raw: &Value,
    ) -> Result<FieldValue, BindError> {
        let Value::Array(items) = raw else {
            return Err(BindError::format(&field.name, "array", raw));
        };

        let mut related = Vec::with_capacity(items.len());
        for item in items {
            let record = match item {
                Value::Object(map) => match map.get(UUID_KEY).filter(|v| !v.is_null()) {
                    Some(uuid) => {
                        let uuid = uuid_text(field, uuid)?;
                        let mut existing = self.by_uuid(target, uuid).await?;
                        self.rebind(&mut existing, map, target).await?;
                        existing
                    }
                    None => {
                        let mut created = Record::new(target);
                        self.rebind(&mut created, map, target).await?;
                        created
                    }
                },
                Value::String(uuid) => self.by_uuid(target, uuid).await?,
                Value::Number(n) => {
                    let identity = truncate(n);
                    self.uow
                        .find(target, identity)
                        .await?
                        .ok_or_else(|| not_found(target, &identity.to_string()))?
                }
                other => return Err(BindError::format(&field.name, "reference", other)),
            };
            related.push(record);
        }

        Ok(FieldValue::Many(related))
    }

    async fn by_uuid(&mut self, target: &str, uuid: &str) -> Result<Record, BindError> {
        find_by_uuid(&mut *self.uow, target, uuid)
            .await?
            .ok_or_else(|| not_found(target, uuid))
    }

    async fn rebind(
        &mut self,
        record: &mut Record,
        payload: &Map<String, Value>,
        target: &str,
    ) -> Result<(), BindError> {
        let descriptor = self.descriptor(target)?;
        self.bind(record, payload, descriptor).await
    }
}

fn not_found(target: &str, identifier: &str) -> BindError {
    BindError::RelatedNotFound {
        entity_type: target.to_string(),
        identifier: identifier.to_string(),
    }
}

fn uuid_text<'v>(field: &FieldDescriptor, value: &'v Value) -> Result<&'v str, BindError> {
    value
        .as_str()
        .ok_or_else(|| BindError::format(&field.name, "uuid string", value))
}

/// Numeric identity from a number or a numeric string
fn identity_of(field: &FieldDescriptor, value: &Value) -> Result<i64, BindError> {
    match value {
        Value::Number(n) => Ok(truncate(n)),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| BindError::format(&field.name, "identity", value)),
        other => Err(BindError::format(&field.name, "identity", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::EntityCatalog;
    use crate::core::entity::EntityDescriptor;
    use crate::core::field::ScalarType;
    use crate::core::store::{Persistence, UnitOfWork};
    use crate::storage::in_memory::InMemoryPersistence;
    use serde_json::json;
    use std::sync::Arc;

    fn catalog() -> Arc<EntityCatalog> {
        Arc::new(
            EntityCatalog::builder()
                .register(
                    EntityDescriptor::new("Item")
                        .scalar("name", ScalarType::Text)
                        .scalar("price", ScalarType::Decimal),
                )
                .register(
                    EntityDescriptor::new("Line")
                        .scalar("quantity", ScalarType::Integer)
                        .many_to_one("item", "Item"),
                )
                .register(
                    EntityDescriptor::new("Invoice")
                        .scalar("number", ScalarType::Text)
                        .one_to_many("lines", "Line"),
                )
                .build()
                .unwrap(),
        )
    }

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    async fn stored_item(uow: &mut dyn UnitOfWork, name: &str) -> Record {
        let mut item = Record::new("Item");
        item.set("name", FieldValue::Text(name.to_string()));
        uow.persist(item).await.unwrap()
    }

    async fn bind(
        catalog: &EntityCatalog,
        uow: &mut dyn UnitOfWork,
        entity: &str,
        body: Value,
    ) -> Result<Record, BindError> {
        let mut record = Record::new(entity);
        let body = payload(body);
        let descriptor = catalog.get(entity).unwrap();
        EntityBinder::new(catalog, uow)
            .bind(&mut record, &body, descriptor)
            .await?;
        Ok(record)
    }

    #[tokio::test]
    async fn test_id_key_with_uuid() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();
        let item = stored_item(uow.as_mut(), "Widget").await;

        let line = bind(
            &catalog,
            uow.as_mut(),
            "Line",
            json!({ "quantity": 5, "itemId": item.uuid }),
        )
        .await
        .unwrap();

        let bound = line.get("item").unwrap().as_one().unwrap();
        assert_eq!(bound.uuid, item.uuid);
    }

    #[tokio::test]
    async fn test_missing_uuid_is_related_not_found() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();

        for body in [
            json!({ "itemId": "nope" }),
            json!({ "item": "nope" }),
            json!({ "item": { "uuid": "nope" } }),
        ] {
            let err = bind(&catalog, uow.as_mut(), "Line", body).await.unwrap_err();
            match err {
                BindError::RelatedNotFound {
                    entity_type,
                    identifier,
                } => {
                    assert_eq!(entity_type, "Item");
                    assert_eq!(identifier, "nope");
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_own_key_wins_over_id_key() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();
        let first = stored_item(uow.as_mut(), "First").await;
        let second = stored_item(uow.as_mut(), "Second").await;

        let line = bind(
            &catalog,
            uow.as_mut(),
            "Line",
            json!({ "item": first.uuid, "itemId": second.uuid }),
        )
        .await
        .unwrap();
        assert_eq!(line.get("item").unwrap().as_one().unwrap().uuid, first.uuid);
    }

    #[tokio::test]
    async fn test_numeric_identity_miss_leaves_field_unchanged() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();
        let item = stored_item(uow.as_mut(), "Widget").await;

        let line = bind(&catalog, uow.as_mut(), "Line", json!({ "itemId": 404 }))
            .await
            .unwrap();
        assert!(line.get("item").is_none());

        let line = bind(
            &catalog,
            uow.as_mut(),
            "Line",
            json!({ "item": { "id": item.identity } }),
        )
        .await
        .unwrap();
        assert_eq!(line.get("item").unwrap().as_one().unwrap().uuid, item.uuid);
    }

    #[tokio::test]
    async fn test_nested_reference_updates_existing_record() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();
        let item = stored_item(uow.as_mut(), "Widget").await;

        let line = bind(
            &catalog,
            uow.as_mut(),
            "Line",
            json!({ "item": { "uuid": item.uuid, "name": "Renamed" } }),
        )
        .await
        .unwrap();

        let bound = line.get("item").unwrap().as_one().unwrap();
        assert!(bound.is_dirty());
        assert_eq!(bound.get("name"), Some(&FieldValue::Text("Renamed".to_string())));
    }

    #[tokio::test]
    async fn test_reference_map_without_identifiers_is_a_format_error() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();

        let err = bind(
            &catalog,
            uow.as_mut(),
            "Line",
            json!({ "item": { "name": "x" } }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BindError::Format { .. }));

        let err = bind(&catalog, uow.as_mut(), "Line", json!({ "itemId": true }))
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::Format { .. }));
    }

    #[tokio::test]
    async fn test_to_many_mixes_new_and_existing() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();
        let item = stored_item(uow.as_mut(), "Widget").await;

        let mut existing = Record::new("Line");
        existing.set("quantity", FieldValue::Integer(1));
        let existing = uow.persist(existing).await.unwrap();

        let invoice = bind(
            &catalog,
            uow.as_mut(),
            "Invoice",
            json!({
                "number": "INV-1",
                "lines": [
                    { "quantity": 5, "itemId": item.uuid },
                    { "uuid": existing.uuid, "quantity": 2 },
                    existing.uuid,
                    existing.identity
                ]
            }),
        )
        .await
        .unwrap();

        let lines = invoice.get("lines").unwrap().as_many().unwrap();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].is_new());
        assert_eq!(lines[0].get("quantity"), Some(&FieldValue::Integer(5)));
        assert_eq!(lines[1].get("quantity"), Some(&FieldValue::Integer(2)));
        assert_eq!(lines[2].uuid, existing.uuid);
        assert_eq!(lines[3].identity, existing.identity);
    }

    #[tokio::test]
    async fn test_to_many_rejects_non_arrays_and_unknown_identities() {
        let catalog = catalog();
        let store = InMemoryPersistence::new(catalog.clone());
        let mut uow = store.begin().await.unwrap();

        let err = bind(&catalog, uow.as_mut(), "Invoice", json!({ "lines": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::Format { .. }));

        let err = bind(&catalog, uow.as_mut(), "Invoice", json!({ "lines": [77] }))
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::RelatedNotFound { .. }));

        let err = bind(&catalog, uow.as_mut(), "Invoice", json!({ "lines": [true] }))
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::Format { .. }));
    }
}
