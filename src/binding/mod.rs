//! Entity binding engine
//!
//! Applies loosely typed JSON payloads onto typed records:
//!
//! - [`coerce`] converts scalar values to the declared field type
//! - [`EntityBinder::resolve`] turns references into related records
//! - [`EntityBinder::bind`] walks an entity's fields and applies both
//!
//! ```rust,ignore
//! let mut uow = persistence.begin().await?;
//! let mut record = Record::new("Invoice");
//! EntityBinder::new(&catalog, uow.as_mut())
//!     .bind(&mut record, &payload, catalog.get("Invoice").unwrap())
//!     .await?;
//! let saved = uow.persist(record).await?;
//! ```

pub mod binder;
pub mod coerce;
pub mod resolver;

pub use binder::{Candidate, EntityBinder};
pub use coerce::coerce;
