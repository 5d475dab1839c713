//! Server module for building HTTP servers over the entity catalog
//!
//! This module provides a `ServerBuilder` that builds the catalog, seeds the
//! store and registers:
//! - CRUD routes for every exposed entity type
//! - Health and introspection routes

pub mod builder;
pub mod dispatcher;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use dispatcher::Dispatcher;
pub use exposure::RestExposure;
pub use host::ServerHost;
