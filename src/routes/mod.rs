//! Declarative route registration.
//!
//! Each service type implements [`Service::declare`], a static registration
//! function that names the service's module and appends one
//! [`RouteDescriptor`] per operation to a [`RouteTable`]. The
//! [`RouteRegistry`] runs that function once per type and caches the result.
//! Binding the tables onto an HTTP router happens later, in
//! [`registrar::Registrar`], where cross-service checks run.

pub mod auth;
pub mod registrar;
pub mod request;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::routing::MethodFilter;
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::error::{DeclarationError, HandlerError};

pub use request::ApiRequest;

// ============================================================================
// Route Descriptors
// ============================================================================

/// HTTP methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub(crate) fn filter(self) -> MethodFilter {
        match self {
            Method::Get => MethodFilter::GET,
            Method::Post => MethodFilter::POST,
            Method::Put => MethodFilter::PUT,
            Method::Patch => MethodFilter::PATCH,
            Method::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options supplied when declaring a route.
///
/// Schema references are opaque identifiers resolved by whatever validates
/// requests and documents the API; routing never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSpec {
    pub auth: bool,
    pub query: Option<&'static str>,
    pub params: Option<&'static str>,
    pub body: Option<&'static str>,
    pub response: Option<&'static str>,
}

impl RouteSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the configured authenticator to accept the request first.
    #[must_use]
    pub fn auth(mut self) -> Self {
        self.auth = true;
        self
    }

    #[must_use]
    pub fn query(mut self, schema: &'static str) -> Self {
        self.query = Some(schema);
        self
    }

    #[must_use]
    pub fn params(mut self, schema: &'static str) -> Self {
        self.params = Some(schema);
        self
    }

    #[must_use]
    pub fn body(mut self, schema: &'static str) -> Self {
        self.body = Some(schema);
        self
    }

    #[must_use]
    pub fn response(mut self, schema: &'static str) -> Self {
        self.response = Some(schema);
        self
    }
}

/// Schema identifiers attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRefs {
    pub query: Option<String>,
    pub params: Option<String>,
    pub body: Option<String>,
    pub response: Option<String>,
}

/// One declared route. Immutable once declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Path relative to the module, always starting with `/`
    pub path: String,
    pub method: Method,
    pub requires_auth: bool,
    /// Name the operation is looked up by; unique within the module
    pub operation_id: String,
    pub schema_refs: SchemaRefs,
}

/// A module name together with its routes in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceModule {
    pub module_name: Option<String>,
    pub routes: Vec<RouteDescriptor>,
}

/// Future returned by a type-erased operation.
pub type HandlerFuture = BoxFuture<'static, Result<serde_json::Value, HandlerError>>;

/// A declared operation on service `S`.
pub type Handler<S> = Arc<dyn Fn(Arc<S>, ApiRequest) -> HandlerFuture + Send + Sync>;

// ============================================================================
// Route Tables
// ============================================================================

/// A service type that exposes HTTP operations.
pub trait Service: Send + Sync + Sized + 'static {
    /// Name the module and declare every route. Called once per type.
    fn declare(routes: &mut RouteTable<Self>) -> Result<(), DeclarationError>;
}

/// Routes and operations accumulated for one service type.
pub struct RouteTable<S> {
    module_name: Option<String>,
    routes: Vec<RouteDescriptor>,
    handlers: HashMap<String, Handler<S>>,
}

impl<S: Send + Sync + 'static> RouteTable<S> {
    pub fn new() -> Self {
        Self {
            module_name: None,
            routes: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Record the module name. Only the first call takes effect.
    pub fn module(&mut self, name: impl Into<String>) -> &mut Self {
        if self.module_name.is_none() {
            self.module_name = Some(name.into());
        }
        self
    }

    pub fn get<F, Fut, R>(
        &mut self,
        path: &str,
        operation_id: &str,
        spec: RouteSpec,
        handler: F,
    ) -> Result<&mut Self, DeclarationError>
    where
        F: Fn(Arc<S>, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        self.route(Method::Get, path, operation_id, spec, handler)
    }

    pub fn post<F, Fut, R>(
        &mut self,
        path: &str,
        operation_id: &str,
        spec: RouteSpec,
        handler: F,
    ) -> Result<&mut Self, DeclarationError>
    where
        F: Fn(Arc<S>, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        self.route(Method::Post, path, operation_id, spec, handler)
    }

    pub fn put<F, Fut, R>(
        &mut self,
        path: &str,
        operation_id: &str,
        spec: RouteSpec,
        handler: F,
    ) -> Result<&mut Self, DeclarationError>
    where
        F: Fn(Arc<S>, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        self.route(Method::Put, path, operation_id, spec, handler)
    }

    pub fn patch<F, Fut, R>(
        &mut self,
        path: &str,
        operation_id: &str,
        spec: RouteSpec,
        handler: F,
    ) -> Result<&mut Self, DeclarationError>
    where
        F: Fn(Arc<S>, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        self.route(Method::Patch, path, operation_id, spec, handler)
    }

    pub fn delete<F, Fut, R>(
        &mut self,
        path: &str,
        operation_id: &str,
        spec: RouteSpec,
        handler: F,
    ) -> Result<&mut Self, DeclarationError>
    where
        F: Fn(Arc<S>, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        self.route(Method::Delete, path, operation_id, spec, handler)
    }

    /// Declare a route with an explicit method.
    pub fn route<F, Fut, R>(
        &mut self,
        method: Method,
        path: &str,
        operation_id: &str,
        spec: RouteSpec,
        handler: F,
    ) -> Result<&mut Self, DeclarationError>
    where
        F: Fn(Arc<S>, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        if !path.starts_with('/') {
            return Err(DeclarationError::InvalidPath {
                path: path.to_string(),
            });
        }
        if operation_id.is_empty() {
            return Err(DeclarationError::EmptyOperationId {
                path: path.to_string(),
            });
        }
        if self.handlers.contains_key(operation_id) {
            return Err(DeclarationError::DuplicateDeclaration {
                operation_id: operation_id.to_string(),
            });
        }

        self.routes.push(RouteDescriptor {
            path: path.to_string(),
            method,
            requires_auth: spec.auth,
            operation_id: operation_id.to_string(),
            schema_refs: SchemaRefs {
                query: spec.query.map(str::to_string),
                params: spec.params.map(str::to_string),
                body: spec.body.map(str::to_string),
                response: spec.response.map(str::to_string),
            },
        });

        let handler: Handler<S> =
            Arc::new(move |service: Arc<S>, request: ApiRequest| -> HandlerFuture {
                let fut = handler(service, request);
                Box::pin(async move {
                    let output = fut.await?;
                    serde_json::to_value(output).map_err(HandlerError::internal)
                })
            });
        self.handlers.insert(operation_id.to_string(), handler);

        Ok(self)
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Declared routes in declaration order.
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    /// Look up an operation by id.
    pub fn handler(&self, operation_id: &str) -> Option<&Handler<S>> {
        self.handlers.get(operation_id)
    }

    pub fn service_module(&self) -> ServiceModule {
        ServiceModule {
            module_name: self.module_name.clone(),
            routes: self.routes.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> Default for RouteTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Route tables keyed by service type, each declared at most once.
#[derive(Default)]
pub struct RouteRegistry {
    tables: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The route table for `S`, running its declaration on first use.
    pub fn declare<S: Service>(&mut self) -> Result<Arc<RouteTable<S>>, DeclarationError> {
        if let Some(table) = self.table::<S>() {
            return Ok(table);
        }

        let mut table = RouteTable::<S>::new();
        S::declare(&mut table)?;
        let table = Arc::new(table);
        self.tables.insert(TypeId::of::<S>(), table.clone());
        Ok(table)
    }

    /// The already-declared table for `S`, if any.
    pub fn table<S: Service>(&self) -> Option<Arc<RouteTable<S>>> {
        self.tables
            .get(&TypeId::of::<S>())
            .and_then(|table| table.clone().downcast::<RouteTable<S>>().ok())
    }

    /// The declared module of `S` with its routes, if declared.
    pub fn module<S: Service>(&self) -> Option<ServiceModule> {
        self.table::<S>().map(|table| table.service_module())
    }
}

/// Public URL of a route: `/` + module + route path without its trailing slash.
#[must_use]
pub fn route_url(module: &str, path: &str) -> String {
    format!("/{}{}", module, path.trim_end_matches('/'))
}

/// The URL as the router matches it: parameter names are erased, so
/// `/items/{id}` and `/items/{item_id}` have the same shape.
#[must_use]
pub fn route_shape(url: &str) -> String {
    url.split('/')
        .map(|segment| {
            if segment.starts_with("{*") && segment.ends_with('}') {
                "{*}"
            } else if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Tests
// ============================================================================
