//! HTTP handlers for the entity routes
//!
//! Every handler is entity-agnostic: the `{entity}` path segment picks the
//! type, and the [`Dispatcher`] does the rest.

use crate::core::error::{RequestError, RestError};
use crate::server::dispatcher::Dispatcher;
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// List all records of a type
pub async fn list_entities(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(entity): Path<String>,
) -> Result<Response, RestError> {
    let records = dispatcher.list(&entity).await?;
    let expose = dispatcher.exposes_identity();
    let views: Vec<_> = records.iter().map(|r| r.view(expose)).collect();
    Ok(Json(views).into_response())
}

/// Get one record
pub async fn get_entity(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Response, RestError> {
    let record = dispatcher.get(&entity, &id).await?;
    Ok(Json(record.view(dispatcher.exposes_identity())).into_response())
}

/// Create a record from the request body
pub async fn create_entity(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(entity): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, RestError> {
    let payload = payload(body)?;
    let record = dispatcher.create(&entity, &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(record.view(dispatcher.exposes_identity())),
    )
        .into_response())
}

/// Update a record from the request body
pub async fn update_entity(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path((entity, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, RestError> {
    let payload = payload(body)?;
    let record = dispatcher.update(&entity, &id, &payload).await?;
    Ok(Json(record.view(dispatcher.exposes_identity())).into_response())
}

/// Delete a record
pub async fn delete_entity(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<StatusCode, RestError> {
    dispatcher.delete(&entity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Introspection: exposed types, their paths and field shapes
pub async fn describe_entities(State(host): State<Arc<ServerHost>>) -> Json<Value> {
    let entities = host.catalog.describe(host.base_path());
    Json(json!({
        "count": entities.len(),
        "entities": entities,
    }))
}

/// Request bodies must be JSON objects
fn payload(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, RestError> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(other)) => Err(RequestError::InvalidBody {
            message: format!("expected a JSON object, got {}", kind_of(&other)),
        }
        .into()),
        Err(rejection) => Err(RequestError::InvalidBody {
            message: rejection.body_text(),
        }
        .into()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
