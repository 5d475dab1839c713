//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::ServerHost;
use crate::config::{AppConfig, IdentifierMode};
use crate::core::catalog::EntityCatalog;
use crate::core::entity::EntityDescriptor;
use crate::core::store::Persistence;
use crate::seed;
use crate::storage::InMemoryPersistence;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for creating HTTP servers that expose registered entity types
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(AppConfig::from_yaml_file("entities.yaml")?)
///     .register_entity(EntityDescriptor::new("Item").scalar("name", ScalarType::Text))
///     .build()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    descriptors: Vec<EntityDescriptor>,
    persistence: Option<Arc<dyn Persistence>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            descriptors: Vec::new(),
            persistence: None,
            custom_routes: Vec::new(),
        }
    }

    /// Use a loaded configuration
    ///
    /// Entity types declared in the configuration are registered alongside
    /// the ones passed to [`register_entity`](Self::register_entity).
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register_entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn register_entities(mut self, descriptors: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Set the persistence backend
    ///
    /// Defaults to an [`InMemoryPersistence`] over the built catalog.
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_identifier_mode(mut self, mode: IdentifierMode) -> Self {
        self.config.binding.identifiers = mode;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.server.base_path = base_path.into();
        self
    }

    /// Add routes that sit beside the entity routes
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    ///
    /// This builds the catalog, opens the persistence backend and applies
    /// the configured seeds.
    pub async fn build_host(self) -> Result<ServerHost> {
        let (host, _) = self.into_parts().await?;
        Ok(host)
    }

    /// Build the final REST router
    pub async fn build(self) -> Result<Router> {
        let (host, custom_routes) = self.into_parts().await?;
        RestExposure::build_router(Arc::new(host), custom_routes)
    }

    async fn into_parts(self) -> Result<(ServerHost, Vec<Router>)> {
        let mut descriptors = self.config.descriptors()?;
        descriptors.extend(self.descriptors);

        let catalog = Arc::new(EntityCatalog::builder().register_all(descriptors).build()?);
        tracing::info!("Exposing entity types: {}", catalog.entity_names().join(", "));

        let persistence: Arc<dyn Persistence> = match self.persistence {
            Some(persistence) => persistence,
            None => Arc::new(InMemoryPersistence::new(catalog.clone())),
        };

        seed::ensure_seeded(&catalog, persistence.as_ref(), &self.config.seeds).await?;

        let host = ServerHost::new(
            catalog,
            persistence,
            self.config.server,
            self.config.binding.identifiers,
        );
        Ok((host, self.custom_routes))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to `server.bind` from the configuration and stops on SIGTERM
    /// or Ctrl+C.
    ///
    /// # Example
    ///
    /// ```ignore
    /// ServerBuilder::new()
    ///     .with_config(config)
    ///     .serve()
    ///     .await?;
    /// ```
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.bind.clone();
        let app = self.build().await?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::ScalarType;
    use crate::core::store::Criteria;

    const YAML: &str = r#"
server:
  base_path: /api
binding:
  identifiers: identity
entities:
  - name: Role
    fields:
      - { name: name, type: text, unique: true }
seeds:
  - entity: Role
    uuid: role-admin
    values: { name: ADMIN }
"#;

    #[tokio::test]
    async fn test_build_host_merges_config_and_registered_entities() {
        let host = ServerBuilder::new()
            .with_config(AppConfig::from_yaml_str(YAML).unwrap())
            .register_entity(EntityDescriptor::new("Item").scalar("name", ScalarType::Text))
            .build_host()
            .await
            .unwrap();

        assert_eq!(host.entity_types(), vec!["Role", "Item"]);
        assert_eq!(host.base_path(), "/api");
        assert_eq!(host.identifiers, IdentifierMode::Identity);
    }

    #[tokio::test]
    async fn test_build_host_applies_seeds() {
        let host = ServerBuilder::new()
            .with_config(AppConfig::from_yaml_str(YAML).unwrap())
            .build_host()
            .await
            .unwrap();

        let mut uow = host.persistence.begin_read().await.unwrap();
        let roles = uow.query("Role", &Criteria::All).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].uuid.as_deref(), Some("role-admin"));
    }

    #[tokio::test]
    async fn test_invalid_catalog_fails_to_build() {
        let result = ServerBuilder::new()
            .register_entity(EntityDescriptor::new("Line").many_to_one("item", "Item"))
            .build_host()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_builder_overrides() {
        let host = ServerBuilder::default()
            .register_entity(EntityDescriptor::new("Item"))
            .with_base_path("/v1/")
            .with_identifier_mode(IdentifierMode::Identity)
            .build_host()
            .await
            .unwrap();
        assert_eq!(host.base_path(), "/v1");
        assert!(host.dispatcher().exposes_identity());
    }
}
