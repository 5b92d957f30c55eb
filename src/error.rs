//! Error types for route declaration, binding, and request handling.
//!
//! Startup errors ([`DeclarationError`], [`BindError`]) are never recovered:
//! they abort before the server accepts traffic. Request errors
//! ([`HandlerError`]) are always recovered at the dispatch boundary and
//! rendered as `{ "detail": <message> }`.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Message used when a handler fails with something that is not an error value.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error.";

/// A malformed route declaration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    /// Route paths are relative to the module and must start with `/`.
    #[error("route path must start with \"/\": {path:?}")]
    InvalidPath {
        /// The offending path
        path: String,
    },

    /// Every route needs an operation id to be looked up by.
    #[error("route {path:?} declared without an operation id")]
    EmptyOperationId {
        /// Path of the route missing its operation id
        path: String,
    },

    /// The same operation id was declared twice on one service type.
    #[error("operation {operation_id:?} declared more than once")]
    DuplicateDeclaration {
        /// The repeated operation id
        operation_id: String,
    },
}

/// Failure while binding declared routes onto the live HTTP surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The service type never named its module.
    #[error("service {service} must declare a non-empty module name")]
    MissingModuleName {
        /// Type name of the service
        service: &'static str,
    },

    /// Two bound routes share a module name and operation id.
    #[error("duplicate route: {module} {operation_id}")]
    DuplicateRoute {
        /// Module the collision occurred in
        module: String,
        /// Colliding operation id
        operation_id: String,
    },

    /// Two bound routes share a method and URL.
    #[error("conflicting route: {method} {url}")]
    ConflictingPath {
        /// HTTP method of both routes
        method: &'static str,
        /// The shared URL
        url: String,
    },

    /// No instance of the service was registered in the container.
    #[error("no instance registered for service {service}")]
    UnresolvedService {
        /// Type name of the service
        service: &'static str,
    },

    /// The service's route declarations were rejected.
    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

/// An error carrying an explicit HTTP status code, mapped verbatim to the response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HttpError {
    /// Status code returned to the client
    pub status: StatusCode,
    /// Human-readable message returned as `detail`
    pub message: String,
}

impl HttpError {
    /// Create an error with an arbitrary status code.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

/// Failure raised while handling a single request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Classified error with its own status code.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Any other runtime failure; reported as 500 with its message.
    #[error("{0}")]
    Internal(String),

    /// The handler failed without an error value (e.g. it panicked).
    #[error("{}", UNKNOWN_ERROR_MESSAGE)]
    Unknown,
}

impl HandlerError {
    /// Wrap any error as an unclassified internal failure.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        HandlerError::Internal(err.to_string())
    }

    /// Status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Http(err) => err.status,
            HandlerError::Internal(_) | HandlerError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body shared by every failure response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        HandlerError::Http(self).into_response()
    }
}

/// Failure reported by the persistence collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not complete the operation.
    #[error("store I/O error: {0}")]
    Io(String),

    /// A record failed the store's field constraints.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// A record violated a uniqueness constraint.
    #[error("duplicate {field}: {value}")]
    Duplicate {
        /// Field carrying the constraint
        field: &'static str,
        /// The conflicting value
        value: String,
    },
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        HandlerError::Internal(err.to_string())
    }
}
