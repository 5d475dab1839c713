//! In-memory transactional store
//!
//! Tables live behind a single `tokio::sync::RwLock`. A write session takes
//! the write lock for its whole lifetime and works on a private copy of the
//! tables, which replaces the shared state on commit. Read sessions share
//! the read lock and see only committed state.

use crate::core::catalog::EntityCatalog;
use crate::core::entity::Record;
use crate::core::error::StorageError;
use crate::core::field::{FieldDescriptor, FieldKind, FieldValue};
use crate::core::store::{Criteria, Persistence, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

/// Stored form of one field
#[derive(Debug, Clone)]
enum Column {
    Value(FieldValue),
    One(Option<i64>),
    Many(Vec<i64>),
}

#[derive(Debug, Clone)]
struct Row {
    uuid: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    columns: HashMap<String, Column>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    next_identity: i64,
    rows: BTreeMap<i64, Row>,
}

/// Every table of the store, keyed by canonical type name
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: HashMap<String, Table>,
}

impl Tables {
    fn row(&self, entity: &str, identity: i64) -> Option<&Row> {
        self.tables.get(entity)?.rows.get(&identity)
    }

    fn identities(&self, entity: &str) -> Vec<i64> {
        self.tables
            .get(entity)
            .map(|t| t.rows.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Rebuild a record and its related graph from stored rows
    ///
    /// Each record is expanded at most once per hydration. `expanded` holds
    /// the records already visited; meeting one of them again, through a
    /// cycle or a second reference, yields a stub carrying only identity and
    /// UUID. The result is linear in the size of the reachable graph.
    fn hydrate(
        &self,
        catalog: &EntityCatalog,
        entity: &str,
        identity: i64,
        expanded: &mut HashSet<(String, i64)>,
    ) -> Option<Record> {
        let row = self.row(entity, identity)?;
        if !expanded.insert((entity.to_string(), identity)) {
            return Some(Record::stub(entity, identity, Some(row.uuid.clone())));
        }
        let descriptor = catalog.get(entity)?;

        let mut record = Record::new(entity);
        record.identity = Some(identity);
        record.uuid = Some(row.uuid.clone());
        record.created_at = Some(row.created_at);
        record.updated_at = Some(row.updated_at);

        for field in &descriptor.fields {
            let column = row.columns.get(&field.name);
            let value = match &field.kind {
                FieldKind::Scalar(_) => match column {
                    Some(Column::Value(v)) => v.clone(),
                    _ => FieldValue::Null,
                },
                FieldKind::ToOneOwning(target) | FieldKind::ToOneReferencing(target) => {
                    match column {
                        Some(Column::One(Some(id))) => FieldValue::One(
                            self.hydrate(catalog, target, *id, expanded).map(Box::new),
                        ),
                        _ => FieldValue::One(None),
                    }
                }
                FieldKind::ToMany { target, .. } => match column {
                    Some(Column::Many(ids)) => FieldValue::Many(
                        ids.iter()
                            .filter_map(|id| self.hydrate(catalog, target, *id, expanded))
                            .collect(),
                    ),
                    _ => FieldValue::Many(Vec::new()),
                },
            };
            record.load(field.name.clone(), value);
        }

        Some(record)
    }

    /// Write a record and its dirty or new related records
    ///
    /// Only the fields present on the record are written. Returns the
    /// record's identity.
    fn write(
        &mut self,
        catalog: &EntityCatalog,
        record: &Record,
        now: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let entity = record.entity();
        let descriptor = catalog
            .get(entity)
            .filter(|d| !d.is_abstract)
            .ok_or_else(|| failed("write", format!("{} is not a stored entity type", entity)))?;

        let identity = match record.identity {
            Some(identity) => {
                if self.row(entity, identity).is_none() {
                    return Err(failed(
                        "merge",
                        format!("{} {} no longer exists", entity, identity),
                    ));
                }
                identity
            }
            None => {
                let table = self.tables.entry(entity.to_string()).or_default();
                table.next_identity += 1;
                let identity = table.next_identity;
                let uuid = record
                    .uuid
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                table.rows.insert(
                    identity,
                    Row {
                        uuid,
                        created_at: now,
                        updated_at: now,
                        columns: HashMap::new(),
                    },
                );
                tracing::debug!("Inserted {} {}", entity, identity);
                identity
            }
        };

        let mut columns = Vec::new();
        for (name, value) in record.fields() {
            let field = descriptor.field_named(name).ok_or_else(|| {
                failed("write", format!("{} has no field '{}'", entity, name))
            })?;
            let column = match (&field.kind, value) {
                (FieldKind::Scalar(_), FieldValue::One(_) | FieldValue::Many(_)) => {
                    return Err(mismatch(entity, field));
                }
                (FieldKind::Scalar(_), v) => Column::Value(v.clone()),
                (kind, FieldValue::Null) if kind.is_to_one() => Column::One(None),
                (kind, FieldValue::One(related)) if kind.is_to_one() => match related {
                    Some(related) => {
                        Column::One(Some(self.write_related(catalog, entity, field, related, now)?))
                    }
                    None => Column::One(None),
                },
                (FieldKind::ToMany { .. }, FieldValue::Null) => Column::Many(Vec::new()),
                (FieldKind::ToMany { .. }, FieldValue::Many(items)) => Column::Many(
                    items
                        .iter()
                        .map(|r| self.write_related(catalog, entity, field, r, now))
                        .collect::<Result<_, _>>()?,
                ),
                _ => return Err(mismatch(entity, field)),
            };
            columns.push((name.to_string(), column));
        }

        let row = self
            .tables
            .get_mut(entity)
            .and_then(|t| t.rows.get_mut(&identity))
            .ok_or_else(|| failed("write", format!("{} {} vanished", entity, identity)))?;
        if record.identity.is_some() {
            row.updated_at = now;
        }
        row.columns.extend(columns);

        Ok(identity)
    }

    fn write_related(
        &mut self,
        catalog: &EntityCatalog,
        owner: &str,
        field: &FieldDescriptor,
        related: &Record,
        now: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        match related.identity {
            Some(identity) => {
                if related.is_dirty() {
                    self.write(catalog, related, now)?;
                }
                Ok(identity)
            }
            None => {
                let cascades = matches!(
                    field.kind,
                    FieldKind::ToOneOwning(_) | FieldKind::ToMany { cascade: true, .. }
                );
                if !cascades {
                    return Err(StorageError::constraint(format!(
                        "{}.{} references an unsaved {}",
                        owner,
                        field.name,
                        related.entity()
                    )));
                }
                self.write(catalog, related, now)
            }
        }
    }

    /// Delete a row, cascading to owned rows
    fn remove(
        &mut self,
        catalog: &EntityCatalog,
        entity: &str,
        identity: i64,
    ) -> Result<(), StorageError> {
        let Some(row) = self
            .tables
            .get_mut(entity)
            .and_then(|t| t.rows.remove(&identity))
        else {
            return Ok(());
        };
        tracing::debug!("Removed {} {}", entity, identity);

        let descriptor = catalog
            .get(entity)
            .ok_or_else(|| failed("remove", format!("{} is not a stored entity type", entity)))?;
        for field in &descriptor.fields {
            match (&field.kind, row.columns.get(&field.name)) {
                (FieldKind::ToOneOwning(target), Some(Column::One(Some(id)))) => {
                    self.remove(catalog, target, *id)?;
                }
                (FieldKind::ToMany { target, cascade: true }, Some(Column::Many(ids))) => {
                    for id in ids {
                        self.remove(catalog, target, *id)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check uniqueness, nullability, ownership and referential integrity
    fn validate(&self, catalog: &EntityCatalog) -> Result<(), StorageError> {
        // Owned row -> owning row and field, across every owning relationship
        let mut owners: HashMap<(&str, i64), String> = HashMap::new();

        for name in catalog.entity_names() {
            let (Some(descriptor), Some(table)) = (catalog.get(name), self.tables.get(name)) else {
                continue;
            };

            let mut uuids = HashSet::new();
            for row in table.rows.values() {
                if !uuids.insert(row.uuid.as_str()) {
                    return Err(StorageError::constraint(format!(
                        "duplicate uuid '{}' for {}",
                        row.uuid, name
                    )));
                }
            }

            for field in &descriptor.fields {
                let mut seen: HashMap<String, i64> = HashMap::new();
                for (identity, row) in &table.rows {
                    let column = row.columns.get(&field.name);
                    match (&field.kind, column) {
                        (FieldKind::Scalar(_), Some(Column::Value(value))) if !value.is_null() => {
                            if field.unique {
                                let key = value.scalar_json().to_string();
                                if seen.insert(key.clone(), *identity).is_some() {
                                    return Err(StorageError::constraint(format!(
                                        "duplicate value {} for unique field '{}.{}'",
                                        key, name, field.name
                                    )));
                                }
                            }
                        }
                        (FieldKind::ToOneOwning(target), Some(Column::One(Some(id)))) => {
                            self.check_reference(name, row, field, target, *id)?;
                            claim(&mut owners, target, *id, name, row, field)?;
                        }
                        (FieldKind::ToOneReferencing(target), Some(Column::One(Some(id)))) => {
                            self.check_reference(name, row, field, target, *id)?;
                            if field.unique && seen.insert(id.to_string(), *identity).is_some() {
                                return Err(StorageError::constraint(format!(
                                    "duplicate reference to {} {} for unique field '{}.{}'",
                                    target, id, name, field.name
                                )));
                            }
                        }
                        (FieldKind::ToMany { target, cascade }, Some(Column::Many(ids))) => {
                            for id in ids {
                                self.check_reference(name, row, field, target, *id)?;
                                if *cascade {
                                    claim(&mut owners, target, *id, name, row, field)?;
                                }
                            }
                        }
                        (FieldKind::ToMany { .. }, _) => {}
                        _ if !field.nullable => {
                            return Err(StorageError::constraint(format!(
                                "NULL not allowed for field '{}.{}'",
                                name, field.name
                            )));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn check_reference(
        &self,
        entity: &str,
        row: &Row,
        field: &FieldDescriptor,
        target: &str,
        identity: i64,
    ) -> Result<(), StorageError> {
        if self.row(target, identity).is_some() {
            return Ok(());
        }
        Err(StorageError::constraint(format!(
            "referential integrity violation: {} {} references missing {} {} through '{}'",
            entity, row.uuid, target, identity, field.name
        )))
    }
}

/// Record `owner` as the single owner of `target` `identity`
fn claim<'t>(
    owners: &mut HashMap<(&'t str, i64), String>,
    target: &'t str,
    identity: i64,
    owner: &str,
    row: &Row,
    field: &FieldDescriptor,
) -> Result<(), StorageError> {
    let claimant = format!("{} {} through '{}'", owner, row.uuid, field.name);
    match owners.get(&(target, identity)) {
        Some(first) => Err(StorageError::constraint(format!(
            "{} {} is owned by {} and cannot also be owned by {}",
            target, identity, first, claimant
        ))),
        None => {
            owners.insert((target, identity), claimant);
            Ok(())
        }
    }
}

fn failed(operation: &str, message: String) -> StorageError {
    StorageError::OperationFailed {
        operation: operation.to_string(),
        message,
    }
}

fn mismatch(entity: &str, field: &FieldDescriptor) -> StorageError {
    failed(
        "write",
        format!(
            "value does not fit {} field '{}.{}'",
            field.kind.label(),
            entity,
            field.name
        ),
    )
}

/// In-memory [`Persistence`] for development and tests
///
/// Cloning shares the underlying tables.
#[derive(Clone)]
pub struct InMemoryPersistence {
    catalog: Arc<EntityCatalog>,
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPersistence {
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self {
            catalog,
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        let guard = self.tables.clone().write_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryUnitOfWork {
            catalog: self.catalog.clone(),
            session: Session::Write { guard, working },
            rollback_only: false,
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        let guard = self.tables.clone().read_owned().await;
        Ok(Box::new(InMemoryUnitOfWork {
            catalog: self.catalog.clone(),
            session: Session::Read(guard),
            rollback_only: false,
        }))
    }
}

enum Session {
    Read(OwnedRwLockReadGuard<Tables>),
    Write {
        guard: OwnedRwLockWriteGuard<Tables>,
        working: Tables,
    },
}

/// Unit of work over [`InMemoryPersistence`]
pub struct InMemoryUnitOfWork {
    catalog: Arc<EntityCatalog>,
    session: Session,
    rollback_only: bool,
}

impl InMemoryUnitOfWork {
    fn tables(&self) -> &Tables {
        match &self.session {
            Session::Read(guard) => guard,
            Session::Write { working, .. } => working,
        }
    }

    fn tables_mut(&mut self, operation: &str) -> Result<&mut Tables, StorageError> {
        match &mut self.session {
            Session::Read(_) => Err(failed(operation, "session is read-only".to_string())),
            Session::Write { working, .. } => Ok(working),
        }
    }

    fn load(&self, entity: &str, identity: i64) -> Option<Record> {
        self.tables()
            .hydrate(&self.catalog, entity, identity, &mut HashSet::new())
    }

    fn store(&mut self, record: Record, operation: &str) -> Result<Record, StorageError> {
        let catalog = self.catalog.clone();
        let tables = self.tables_mut(operation)?;
        let identity = tables.write(&catalog, &record, Utc::now())?;
        self.load(record.entity(), identity)
            .ok_or_else(|| failed(operation, format!("{} {} vanished", record.entity(), identity)))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find(&mut self, entity: &str, identity: i64) -> Result<Option<Record>, StorageError> {
        Ok(self.load(entity, identity))
    }

    async fn query(
        &mut self,
        entity: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, StorageError> {
        let tables = self.tables();
        let identities = match criteria {
            Criteria::All => tables.identities(entity),
            Criteria::Uuid(uuid) => tables
                .identities(entity)
                .into_iter()
                .filter(|id| tables.row(entity, *id).is_some_and(|r| &r.uuid == uuid))
                .collect(),
        };
        Ok(identities
            .into_iter()
            .filter_map(|id| self.load(entity, id))
            .collect())
    }

    async fn persist(&mut self, record: Record) -> Result<Record, StorageError> {
        if let Some(identity) = record.identity {
            return Err(failed(
                "persist",
                format!("{} {} is already persistent", record.entity(), identity),
            ));
        }
        tracing::debug!("Persisting new {}", record.entity());
        self.store(record, "persist")
    }

    async fn merge(&mut self, record: Record) -> Result<Record, StorageError> {
        tracing::debug!("Merging {} {:?}", record.entity(), record.identity);
        self.store(record, "merge")
    }

    async fn remove(&mut self, record: &Record) -> Result<(), StorageError> {
        let identity = record.identity.ok_or_else(|| {
            failed(
                "remove",
                format!("{} was never persisted", record.entity()),
            )
        })?;
        let catalog = self.catalog.clone();
        self.tables_mut("remove")?
            .remove(&catalog, record.entity(), identity)
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        self.tables().validate(&self.catalog)
    }

    fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemoryUnitOfWork {
            catalog,
            session,
            rollback_only,
        } = *self;
        match session {
            Session::Read(_) => Ok(()),
            Session::Write { mut guard, working } => {
                if rollback_only {
                    tracing::debug!("Transaction marked rollback-only, discarding changes");
                    return Ok(());
                }
                working.validate(&catalog)?;
                *guard = working;
                Ok(())
            }
        }
    }
}
