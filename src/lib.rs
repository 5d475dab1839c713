//! # entity-rest
//!
//! A generic CRUD REST layer. Every registered entity type is exposed under
//! `/rest/{entity}`, and loosely typed JSON payloads are bound onto typed
//! records by the entity binding engine.
//!
//! ## Features
//!
//! - **Entity catalog**: kebab-case URL names, case-insensitive lookup,
//!   inheritance flattened once at startup
//! - **Type coercion**: strings, numbers and booleans converted to the
//!   declared field types
//! - **Relationship resolution**: references by UUID, numeric identity or
//!   nested object, with nested creation and update-through-reference
//! - **Transactional writes**: one unit of work per request, rolled back on
//!   any failure
//! - **Configuration-Based**: entity types and seed records in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entity_rest::prelude::*;
//!
//! let app = ServerBuilder::new()
//!     .register_entity(entity!(Item {
//!         name: text,
//!         code: text [unique],
//!         price: decimal,
//!     }))
//!     .register_entity(entity!(Line {
//!         quantity: integer,
//!         item: many_to_one(Item),
//!     }))
//!     .build()
//!     .await?;
//!
//! // POST /rest/item {"name": "Widget", "code": "W-1", "price": 9.99}
//! // POST /rest/line {"quantity": 5, "itemId": "<item uuid>"}
//! ```

pub mod binding;
pub mod config;
pub mod core;
pub mod entities;
pub mod seed;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        catalog::{CatalogError, EntityCatalog},
        entity::{EntityDescriptor, Record},
        error::{BindError, EntityError, RequestError, RestError, RestResult, StorageError},
        field::{FieldDescriptor, FieldKind, FieldValue, ScalarType},
        naming::EntityNaming,
        store::{Criteria, Persistence, UnitOfWork},
    };

    // === Binding ===
    pub use crate::binding::{EntityBinder, coerce};

    // === Configuration ===
    pub use crate::config::{AppConfig, IdentifierMode, SeedConfig};

    // === Macros ===
    pub use crate::entity;

    // === Server ===
    pub use crate::server::{Dispatcher, RestExposure, ServerBuilder, ServerHost};

    // === Storage ===
    pub use crate::storage::InMemoryPersistence;

    // === Seeding ===
    pub use crate::seed::ensure_seeded;
}
