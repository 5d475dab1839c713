//! Server host for transport-agnostic API exposure
//!
//! The host holds everything an exposure needs: the entity catalog, the
//! persistence backend and the server settings. It is built once by the
//! [`ServerBuilder`](super::ServerBuilder) and shared behind an `Arc`.

use super::dispatcher::Dispatcher;
use crate::config::{IdentifierMode, ServerConfig};
use crate::core::catalog::EntityCatalog;
use crate::core::store::Persistence;
use std::sync::Arc;

/// Host context containing all framework state
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerBuilder::new().with_config(config).build_host().await?);
/// let app = RestExposure::build_router(host, vec![])?;
/// ```
pub struct ServerHost {
    /// Every exposed entity type
    pub catalog: Arc<EntityCatalog>,

    pub persistence: Arc<dyn Persistence>,

    /// Listener address and route prefix
    pub settings: ServerConfig,

    pub identifiers: IdentifierMode,
}

impl ServerHost {
    pub fn new(
        catalog: Arc<EntityCatalog>,
        persistence: Arc<dyn Persistence>,
        settings: ServerConfig,
        identifiers: IdentifierMode,
    ) -> Self {
        Self {
            catalog,
            persistence,
            settings,
            identifiers,
        }
    }

    /// A dispatcher over this host's catalog and persistence
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.catalog.clone(),
            self.persistence.clone(),
            self.identifiers,
        )
    }

    /// Entity types exposed by the host
    pub fn entity_types(&self) -> Vec<&str> {
        self.catalog.entity_names()
    }

    /// Route prefix without a trailing slash
    pub fn base_path(&self) -> &str {
        self.settings.base_path.trim_end_matches('/')
    }
}
