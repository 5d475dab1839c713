//! Persistence traits
//!
//! A [`Persistence`] hands out request-scoped [`UnitOfWork`] sessions. The
//! binder and the dispatcher only ever talk to the unit of work, so any
//! backend that can provide transactional find/query/persist/merge/remove
//! plugs in behind these two traits.

use crate::core::entity::Record;
use crate::core::error::StorageError;
use async_trait::async_trait;

/// Selection for [`UnitOfWork::query`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criteria {
    /// Every record of the type
    All,
    /// Records carrying this UUID (at most one)
    Uuid(String),
}

/// Factory for units of work
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Open a read-write session
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError>;

    /// Open a read-only session
    ///
    /// Read-only sessions may run concurrently with each other. Writes
    /// through one fail.
    async fn begin_read(&self) -> Result<Box<dyn UnitOfWork>, StorageError>;
}

/// A transactional session
///
/// Nothing written through a unit of work is visible to other sessions
/// until [`commit`](UnitOfWork::commit). Dropping a session without
/// committing discards its changes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Load a record by numeric identity
    async fn find(&mut self, entity: &str, identity: i64) -> Result<Option<Record>, StorageError>;

    /// Load the records of `entity` matching `criteria`, in identity order
    async fn query(&mut self, entity: &str, criteria: &Criteria)
    -> Result<Vec<Record>, StorageError>;

    /// Insert a new record, cascading to new related records where the
    /// relationship allows it. Stamps identity, UUID and timestamps.
    async fn persist(&mut self, record: Record) -> Result<Record, StorageError>;

    /// Write the set fields of a record back. New records are inserted.
    async fn merge(&mut self, record: Record) -> Result<Record, StorageError>;

    /// Delete a record and the records it owns
    async fn remove(&mut self, record: &Record) -> Result<(), StorageError>;

    /// Check every constraint against the pending state
    async fn flush(&mut self) -> Result<(), StorageError>;

    /// Forbid commit. Any pending change is discarded when the session ends.
    fn set_rollback_only(&mut self);

    fn is_rollback_only(&self) -> bool;

    /// Publish pending changes, or discard them if marked rollback-only
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Load a single record by UUID
pub async fn find_by_uuid(
    uow: &mut dyn UnitOfWork,
    entity: &str,
    uuid: &str,
) -> Result<Option<Record>, StorageError> {
    let mut found = uow.query(entity, &Criteria::Uuid(uuid.to_string())).await?;
    Ok(if found.is_empty() {
        None
    } else {
        Some(found.swap_remove(0))
    })
}
