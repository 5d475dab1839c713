//! Core module containing the fundamental types and traits of the framework

pub mod catalog;
pub mod entity;
pub mod error;
pub mod field;
pub mod naming;
pub mod store;

pub use catalog::{CatalogError, EntityCatalog};
pub use entity::{EntityDescriptor, Record};
pub use error::{BindError, EntityError, RestError, RestResult, StorageError};
pub use field::{FieldDescriptor, FieldKind, FieldValue, ScalarType};
pub use naming::EntityNaming;
pub use store::{Criteria, Persistence, UnitOfWork};
