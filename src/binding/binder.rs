//! Entity binder: applies a JSON payload onto a record

use crate::binding::coerce::coerce;
use crate::core::catalog::EntityCatalog;
use crate::core::entity::{EntityDescriptor, Record, is_system_key};
use crate::core::error::BindError;
use crate::core::field::FieldKind;
use crate::core::naming::EntityNaming;
use crate::core::store::UnitOfWork;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

/// Where a relationship value was found in the payload
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'p> {
    /// Under the field's own key
    Own(&'p Value),
    /// Under `{field}Id`
    IdKey(&'p Value),
}

/// Binds payloads onto records within one unit of work
///
/// Related records referenced by the payload are looked up through the same
/// unit of work, so everything a request touches commits or rolls back
/// together.
pub struct EntityBinder<'a> {
    pub(crate) catalog: &'a EntityCatalog,
    pub(crate) uow: &'a mut dyn UnitOfWork,
}

impl<'a> EntityBinder<'a> {
    pub fn new(catalog: &'a EntityCatalog, uow: &'a mut dyn UnitOfWork) -> Self {
        Self { catalog, uow }
    }

    /// Apply `payload` onto `record`, which must be an instance of `entity`
    ///
    /// Fields are visited in flattened declaration order. System keys and
    /// unknown keys are ignored; a missing or `null` value leaves the field
    /// as it is. Every field that is written marks the record dirty.
    pub fn bind<'s>(
        &'s mut self,
        record: &'s mut Record,
        payload: &'s Map<String, Value>,
        entity: &'a EntityDescriptor,
    ) -> BoxFuture<'s, Result<(), BindError>> {
        async move {
            if record.entity() != entity.name {
                return Err(BindError::Reflection {
                    entity_type: entity.name.clone(),
                    field: String::new(),
                    message: format!("record is a {}", record.entity()),
                });
            }

            for field in &entity.fields {
                if is_system_key(&field.name) {
                    continue;
                }

                match &field.kind {
                    FieldKind::Scalar(scalar) => {
                        let Some(raw) = present(payload, &field.name) else {
                            continue;
                        };
                        let value = coerce(&field.name, raw, *scalar)?;
                        record.set(field.name.clone(), value);
                    }
                    kind => {
                        let candidate = match present(payload, &field.name) {
                            Some(raw) => Candidate::Own(raw),
                            None if kind.is_to_one() => {
                                match present(payload, &EntityNaming::id_key(&field.name)) {
                                    Some(raw) => Candidate::IdKey(raw),
                                    None => continue,
                                }
                            }
                            None => continue,
                        };
                        if let Some(value) = self.resolve(field, candidate).await? {
                            record.set(field.name.clone(), value);
                        }
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Descriptor of a relationship target
    pub(crate) fn descriptor(&self, type_name: &str) -> Result<&'a EntityDescriptor, BindError> {
        let catalog = self.catalog;
        catalog
            .get(type_name)
            .filter(|d| !d.is_abstract)
            .ok_or_else(|| BindError::Reflection {
                entity_type: type_name.to_string(),
                field: String::new(),
                message: "type is not registered".to_string(),
            })
    }
}

/// Payload value under `key`, treating `null` as absent
fn present<'p>(payload: &'p Map<String, Value>, key: &str) -> Option<&'p Value> {
    payload.get(key).filter(|v| !v.is_null())
}
