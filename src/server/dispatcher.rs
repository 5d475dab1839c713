//! Request dispatcher
//!
//! Maps the five REST verbs onto catalog lookups, binding and unit-of-work
//! calls. It knows nothing about HTTP: every operation returns records or a
//! [`RestError`], and the exposure layer turns those into responses.
//!
//! Writes run in one unit of work per request. Any failure after the unit
//! of work is opened marks it rollback-only, so nothing a failed request
//! bound or persisted survives.

use crate::binding::EntityBinder;
use crate::config::IdentifierMode;
use crate::core::catalog::EntityCatalog;
use crate::core::entity::{EntityDescriptor, Record};
use crate::core::error::{EntityError, RestError, RestResult};
use crate::core::store::{Criteria, Persistence, UnitOfWork, find_by_uuid};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Transport-agnostic CRUD operations over every catalogued entity type
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<EntityCatalog>,
    persistence: Arc<dyn Persistence>,
    identifiers: IdentifierMode,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<EntityCatalog>,
        persistence: Arc<dyn Persistence>,
        identifiers: IdentifierMode,
    ) -> Self {
        Self {
            catalog,
            persistence,
            identifiers,
        }
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    /// Whether rendered records carry their numeric identity
    pub fn exposes_identity(&self) -> bool {
        self.identifiers.exposes_identity()
    }

    /// Every record of the type
    pub async fn list(&self, segment: &str) -> RestResult<Vec<Record>> {
        tracing::debug!("GET {} - Listing all entities", segment);
        let descriptor = self.resolve(segment)?;

        let mut uow = self.persistence.begin_read().await?;
        match uow.query(&descriptor.name, &Criteria::All).await {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::error!("Error fetching entities for {}: {}", segment, e);
                Err(RestError::Internal(format!("Failed to fetch entities: {}", e)))
            }
        }
    }

    /// One record by identifier
    pub async fn get(&self, segment: &str, identifier: &str) -> RestResult<Record> {
        tracing::debug!("GET {}/{} - Getting entity", segment, identifier);
        let descriptor = self.resolve(segment)?;

        let mut uow = self.persistence.begin_read().await?;
        self.locate(uow.as_mut(), descriptor, identifier).await
    }

    /// Bind a payload onto a new record and persist it
    pub async fn create(&self, segment: &str, payload: &Map<String, Value>) -> RestResult<Record> {
        tracing::debug!("POST {} - Creating new entity", segment);
        let descriptor = self.resolve(segment)?;

        let mut uow = self.persistence.begin().await?;
        let result = self.create_in(uow.as_mut(), descriptor, payload).await;
        let created = self.finish(uow, result, "creating", segment).await?;

        tracing::info!(
            "Successfully created entity {}: {}",
            segment,
            created.uuid.as_deref().unwrap_or_default()
        );
        Ok(created)
    }

    /// Bind a payload onto an existing record and merge it
    pub async fn update(
        &self,
        segment: &str,
        identifier: &str,
        payload: &Map<String, Value>,
    ) -> RestResult<Record> {
        tracing::debug!("PUT {}/{} - Updating entity", segment, identifier);
        let descriptor = self.resolve(segment)?;

        let mut uow = self.persistence.begin().await?;
        let result = self
            .update_in(uow.as_mut(), descriptor, identifier, payload)
            .await;
        let updated = self.finish(uow, result, "updating", segment).await?;

        tracing::info!("Successfully updated entity {}: {}", segment, identifier);
        Ok(updated)
    }

    /// Remove a record and everything it owns
    ///
    /// Any storage failure, referential violations included, is reported as
    /// an internal error.
    pub async fn delete(&self, segment: &str, identifier: &str) -> RestResult<()> {
        tracing::debug!("DELETE {}/{} - Deleting entity", segment, identifier);
        let descriptor = self.resolve(segment)?;

        let mut uow = self.persistence.begin().await?;
        let result = match self.locate(uow.as_mut(), descriptor, identifier).await {
            Ok(record) => match Self::remove_in(uow.as_mut(), &record).await {
                Ok(()) => Ok(()),
                Err(e) => Err(RestError::Internal(format!("Failed to delete entity: {}", e))),
            },
            Err(e) => Err(e),
        };
        self.finish(uow, result, "deleting", segment).await?;

        tracing::info!("Successfully deleted entity {}: {}", segment, identifier);
        Ok(())
    }

    fn resolve(&self, segment: &str) -> RestResult<&EntityDescriptor> {
        self.catalog.resolve(segment).ok_or_else(|| {
            EntityError::UnknownType {
                name: segment.to_string(),
            }
            .into()
        })
    }

    async fn locate(
        &self,
        uow: &mut dyn UnitOfWork,
        descriptor: &EntityDescriptor,
        identifier: &str,
    ) -> RestResult<Record> {
        let found = match self.identifiers {
            IdentifierMode::Uuid => find_by_uuid(uow, &descriptor.name, identifier).await?,
            IdentifierMode::Identity => match identifier.parse::<i64>() {
                Ok(identity) => uow.find(&descriptor.name, identity).await?,
                Err(_) => None,
            },
        };
        found.ok_or_else(|| {
            EntityError::InstanceNotFound {
                entity_type: descriptor.name.clone(),
                identifier: identifier.to_string(),
            }
            .into()
        })
    }

    async fn create_in(
        &self,
        uow: &mut dyn UnitOfWork,
        descriptor: &EntityDescriptor,
        payload: &Map<String, Value>,
    ) -> RestResult<Record> {
        let mut record = Record::new(&descriptor.name);
        EntityBinder::new(&self.catalog, &mut *uow)
            .bind(&mut record, payload, descriptor)
            .await?;
        let saved = uow.persist(record).await?;
        uow.flush().await?;
        Ok(saved)
    }

    async fn update_in(
        &self,
        uow: &mut dyn UnitOfWork,
        descriptor: &EntityDescriptor,
        identifier: &str,
        payload: &Map<String, Value>,
    ) -> RestResult<Record> {
        let mut record = self.locate(&mut *uow, descriptor, identifier).await?;
        EntityBinder::new(&self.catalog, &mut *uow)
            .bind(&mut record, payload, descriptor)
            .await?;
        let saved = uow.merge(record).await?;
        uow.flush().await?;
        Ok(saved)
    }

    async fn remove_in(uow: &mut dyn UnitOfWork, record: &Record) -> RestResult<()> {
        uow.remove(record).await?;
        uow.flush().await?;
        Ok(())
    }

    /// Commit on success, roll back on failure
    async fn finish<T>(
        &self,
        mut uow: Box<dyn UnitOfWork>,
        result: RestResult<T>,
        action: &str,
        segment: &str,
    ) -> RestResult<T> {
        match result {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(e) => {
                uow.set_rollback_only();
                if let Err(rollback) = uow.commit().await {
                    tracing::error!("Rollback failed while {} {}: {}", action, segment, rollback);
                }
                match &e {
                    RestError::Entity(_) => {
                        tracing::debug!("Nothing to do while {} {}: {}", action, segment, e)
                    }
                    RestError::Storage(s) if s.is_constraint_violation() => {
                        tracing::error!(
                            "Database constraint violation {} entity {}: {}",
                            action,
                            segment,
                            e
                        )
                    }
                    _ => tracing::error!("Error {} entity {}: {}", action, segment, e),
                }
                Err(e)
            }
        }
    }
}
