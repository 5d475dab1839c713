//! REST API exposure
//!
//! Consumes a [`ServerHost`] and produces an Axum `Router` with:
//!
//! - `GET|POST {base}/{entity}` and `GET|PUT|DELETE {base}/{entity}/{id}`
//! - `GET /health` and `GET /healthz`
//! - `GET /api-docs/entities` for catalog introspection

pub mod handlers;

use super::super::host::ServerHost;
use anyhow::Result;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// `custom_routes` are merged alongside the generated routes.
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let base = host.base_path().to_string();
        if !base.is_empty() && !base.starts_with('/') {
            anyhow::bail!("base path '{}' must start with '/'", base);
        }
        if base.contains(['{', '}', ':', '*']) {
            anyhow::bail!("base path '{}' must not contain route parameters", base);
        }

        let dispatcher = Arc::new(host.dispatcher());
        let entity_routes = Router::new()
            .route(
                &format!("{}/{{entity}}", base),
                get(handlers::list_entities).post(handlers::create_entity),
            )
            .route(
                &format!("{}/{{entity}}/{{id}}", base),
                get(handlers::get_entity)
                    .put(handlers::update_entity)
                    .delete(handlers::delete_entity),
            )
            .with_state(dispatcher);

        let docs_routes = Router::new()
            .route("/api-docs/entities", get(handlers::describe_entities))
            .with_state(host.clone());

        let mut app = Self::health_routes().merge(docs_routes).merge(entity_routes);
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        tracing::debug!(
            "REST routes built for {} entity types under '{}'",
            host.entity_types().len(),
            base
        );
        Ok(app.layer(TraceLayer::new_for_http()))
    }

    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "entity-rest"
        }))
    }
}
