//! Typed error handling for entity-rest
//!
//! Every failure a request can hit maps to exactly one HTTP status, and the
//! response body is always `{"error": "<message>"}`.
//!
//! # Error Categories
//!
//! - [`EntityError`]: unknown entity type or unknown instance (404)
//! - [`BindError`]: payload values that cannot be bound (400)
//! - [`StorageError`]: constraint violations (400) and store failures (500)
//! - [`RequestError`]: malformed request bodies (400)
//!
//! # Example
//!
//! ```rust,ignore
//! match dispatcher.get("invoice", &uuid).await {
//!     Ok(record) => println!("{:?}", record),
//!     Err(RestError::Entity(EntityError::InstanceNotFound { identifier, .. })) => {
//!         println!("no invoice {}", identifier);
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type returned by the request dispatcher
#[derive(Debug)]
pub enum RestError {
    /// Entity type or instance lookup failed
    Entity(EntityError),

    /// The payload could not be bound onto the record
    Bind(BindError),

    /// The unit of work rejected the change or failed
    Storage(StorageError),

    /// The request itself is malformed
    Request(RequestError),

    /// Anything else
    Internal(String),
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::Entity(e) => write!(f, "{}", e),
            RestError::Bind(e) => write!(f, "{}", e),
            RestError::Storage(e) => write!(f, "{}", e),
            RestError::Request(e) => write!(f, "{}", e),
            RestError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RestError::Entity(e) => Some(e),
            RestError::Bind(e) => Some(e),
            RestError::Storage(e) => Some(e),
            RestError::Request(e) => Some(e),
            RestError::Internal(_) => None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl RestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::Entity(_) => StatusCode::NOT_FOUND,
            RestError::Bind(_) => StatusCode::BAD_REQUEST,
            RestError::Storage(e) => e.status_code(),
            RestError::Request(_) => StatusCode::BAD_REQUEST,
            RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code used in logs
    pub fn error_code(&self) -> &'static str {
        match self {
            RestError::Entity(e) => e.error_code(),
            RestError::Bind(e) => e.error_code(),
            RestError::Storage(e) => e.error_code(),
            RestError::Request(_) => "INVALID_REQUEST",
            RestError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Lookup failures for entity types and instances
#[derive(Debug, Clone, PartialEq)]
pub enum EntityError {
    /// No entity type is registered under this URL segment
    UnknownType { name: String },

    /// No instance of the type carries this identifier
    InstanceNotFound {
        entity_type: String,
        identifier: String,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::UnknownType { name } => write!(f, "Entity not found: {}", name),
            EntityError::InstanceNotFound {
                entity_type,
                identifier,
            } => write!(f, "{} with identifier {} not found", entity_type, identifier),
        }
    }
}

impl std::error::Error for EntityError {}

impl EntityError {
    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::UnknownType { .. } => "ENTITY_NOT_FOUND",
            EntityError::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
        }
    }
}

impl From<EntityError> for RestError {
    fn from(err: EntityError) -> Self {
        RestError::Entity(err)
    }
}

// =============================================================================
// Bind Errors
// =============================================================================

/// Failures raised while binding a payload onto a record
#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    /// A value cannot be coerced to the field's declared type
    Format {
        field: String,
        expected: String,
        value: String,
    },

    /// An explicitly referenced related record does not exist
    RelatedNotFound {
        entity_type: String,
        identifier: String,
    },

    /// A field cannot be written
    Reflection {
        entity_type: String,
        field: String,
        message: String,
    },

    /// The unit of work failed while resolving a reference
    Storage(StorageError),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Format {
                field,
                expected,
                value,
            } => write!(
                f,
                "Invalid value for field '{}': expected {}, got {}",
                field, expected, value
            ),
            BindError::RelatedNotFound {
                entity_type,
                identifier,
            } => write!(
                f,
                "Related entity {} with identifier {} not found",
                entity_type, identifier
            ),
            BindError::Reflection {
                entity_type,
                field,
                message,
            } => write!(
                f,
                "Cannot write field '{}' of {}: {}",
                field, entity_type, message
            ),
            BindError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BindError {}

impl BindError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BindError::Format { .. } => "FORMAT_ERROR",
            BindError::RelatedNotFound { .. } => "RELATED_NOT_FOUND",
            BindError::Reflection { .. } => "REFLECTION_ERROR",
            BindError::Storage(e) => e.error_code(),
        }
    }

    pub(crate) fn format(field: &str, expected: &str, value: &serde_json::Value) -> Self {
        BindError::Format {
            field: field.to_string(),
            expected: expected.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<StorageError> for BindError {
    fn from(err: StorageError) -> Self {
        BindError::Storage(err)
    }
}

/// Storage failures surfaced during binding keep their own status
impl From<BindError> for RestError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::Storage(e) => RestError::Storage(e),
            other => RestError::Bind(other),
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by a unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Uniqueness, not-null or referential integrity failure
    ConstraintViolation { message: String },

    /// The store could not complete the operation
    OperationFailed { operation: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConstraintViolation { message } => {
                write!(f, "Database constraint violation: {}", message)
            }
            StorageError::OperationFailed { operation, message } => {
                write!(f, "Storage {} failed: {}", operation, message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    pub fn constraint(message: impl Into<String>) -> Self {
        StorageError::ConstraintViolation {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StorageError::ConstraintViolation { .. } => StatusCode::BAD_REQUEST,
            StorageError::OperationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            StorageError::OperationFailed { .. } => "STORAGE_ERROR",
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StorageError::ConstraintViolation { .. })
    }
}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        RestError::Storage(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors in the shape of the HTTP request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    InvalidBody { message: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidBody { message } => write!(f, "Invalid request body: {}", message),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<RequestError> for RestError {
    fn from(err: RequestError) -> Self {
        RestError::Request(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::Request(RequestError::InvalidBody {
            message: err.to_string(),
        })
    }
}

impl From<anyhow::Error> for RestError {
    fn from(err: anyhow::Error) -> Self {
        RestError::Internal(err.to_string())
    }
}

/// A specialized Result type for dispatcher operations
pub type RestResult<T> = Result<T, RestError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_is_404() {
        let err = RestError::from(EntityError::UnknownType {
            name: "widget".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Entity not found: widget");
        assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");
    }

    #[test]
    fn test_instance_not_found_is_404() {
        let err = RestError::from(EntityError::InstanceNotFound {
            entity_type: "Invoice".to_string(),
            identifier: "abc".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_bind_errors_are_400() {
        let err = RestError::from(BindError::format("price", "decimal", &serde_json::json!("x")));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("price"));

        let err = RestError::from(BindError::RelatedNotFound {
            entity_type: "Item".to_string(),
            identifier: "missing".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Item"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_storage_error_inside_bind_keeps_storage_status() {
        let err = RestError::from(BindError::Storage(StorageError::OperationFailed {
            operation: "query".to_string(),
            message: "lock poisoned".to_string(),
        }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, RestError::Storage(_)));
    }

    #[test]
    fn test_constraint_violation_is_400_with_prefix() {
        let err = RestError::from(StorageError::constraint("duplicate code"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Database constraint violation: duplicate code"
        );
    }

    #[test]
    fn test_internal_is_500() {
        let err = RestError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_has_single_error_key() {
        let err = RestError::Request(RequestError::InvalidBody {
            message: "expected object".to_string(),
        });
        let body = serde_json::to_value(err.to_response()).unwrap();
        let obj = body.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["error"].as_str().unwrap().contains("expected object"));
    }
}
