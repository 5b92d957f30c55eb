//! Binding declared routes onto an axum router, and per-request dispatch.
//!
//! Every request passes through the same states:
//!
//! 1. [`assign_trace`] generates a trace id and binds it for the rest of the request
//! 2. [`require_auth`] runs, only on gated routes
//! 3. the operation is resolved from the container and invoked
//! 4. its buffered logs are dumped, info-only on success, everything on failure
//! 5. the response is written: `200` with the operation's value, or `{ "detail" }`
//!    with the error's status
//!
//! Failures never escape the dispatch boundary; a panicking operation is
//! reported like any other failure.

use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::{Path, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::on;
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::FutureExt;
use http::{HeaderMap, HeaderValue, StatusCode, Uri};
use tracing::Instrument;

use super::auth::{AuthGate, Authenticator, require_auth};
use super::{
    ApiRequest, HandlerFuture, Method, RouteDescriptor, RouteRegistry, Service, route_shape,
    route_url,
};
use crate::container::ServiceContainer;
use crate::error::{BindError, HandlerError};
use crate::logger::LoggerFactory;
use crate::trace_context::{self, TRACE_ID_HEADER, TraceId};

/// A bound operation with its service already erased.
type Endpoint = Arc<dyn Fn(ApiRequest) -> HandlerFuture + Send + Sync>;

struct BoundRoute {
    module: String,
    descriptor: RouteDescriptor,
    url: String,
    endpoint: Endpoint,
}

/// Collects services and binds their routes onto one router.
///
/// All cross-service checks run in [`Registrar::mount`], so a misconfigured
/// service aborts startup before any traffic is accepted.
pub struct Registrar {
    container: Arc<ServiceContainer>,
    factory: LoggerFactory,
    authenticator: Option<Arc<dyn Authenticator>>,
    registry: RouteRegistry,
    operations: HashSet<(String, String)>,
    /// `(method, route shape)` of every bound route
    endpoints: HashSet<(Method, String)>,
    /// Route shape to the URL that first claimed it
    shapes: HashMap<String, String>,
    routes: Vec<BoundRoute>,
}

impl Registrar {
    pub fn new(container: Arc<ServiceContainer>, factory: LoggerFactory) -> Self {
        Self {
            container,
            factory,
            authenticator: None,
            registry: RouteRegistry::new(),
            operations: HashSet::new(),
            endpoints: HashSet::new(),
            shapes: HashMap::new(),
            routes: Vec::new(),
        }
    }

    /// Gate auth-required routes with `authenticator`. `None` leaves them ungated.
    pub fn with_authenticator(mut self, authenticator: Option<Arc<dyn Authenticator>>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Bind every route declared by `S`.
    pub fn mount<S: Service>(&mut self) -> Result<&mut Self, BindError> {
        let table = self.registry.declare::<S>()?;

        let module = table
            .module_name()
            .filter(|name| !name.is_empty())
            .ok_or(BindError::MissingModuleName {
                service: type_name::<S>(),
            })?
            .to_string();

        if !self.container.contains::<S>() {
            return Err(BindError::UnresolvedService {
                service: type_name::<S>(),
            });
        }

        for descriptor in table.routes() {
            let operation = (module.clone(), descriptor.operation_id.clone());
            if !self.operations.insert(operation) {
                return Err(BindError::DuplicateRoute {
                    module,
                    operation_id: descriptor.operation_id.clone(),
                });
            }

            // The router rejects two URLs of one shape unless they are identical,
            // whatever their methods.
            let url = route_url(&module, &descriptor.path);
            let shape = route_shape(&url);
            let same_url = self.shapes.get(&shape).is_none_or(|claimed| *claimed == url);
            if !same_url || !self.endpoints.insert((descriptor.method, shape.clone())) {
                return Err(BindError::ConflictingPath {
                    method: descriptor.method.as_str(),
                    url,
                });
            }
            self.shapes.entry(shape).or_insert_with(|| url.clone());

            let container = self.container.clone();
            let table = table.clone();
            let operation_id = descriptor.operation_id.clone();
            let endpoint: Endpoint = Arc::new(move |request: ApiRequest| -> HandlerFuture {
                let Some(service) = container.resolve::<S>() else {
                    return Box::pin(future::ready(Err(HandlerError::Internal(format!(
                        "service {} is not registered",
                        type_name::<S>()
                    )))));
                };
                match table.handler(&operation_id) {
                    Some(handler) => handler(service, request),
                    None => Box::pin(future::ready(Err(HandlerError::Internal(format!(
                        "operation {operation_id} is not declared"
                    ))))),
                }
            });

            tracing::info!(
                module = %module,
                method = %descriptor.method,
                url = %url,
                operation_id = %descriptor.operation_id,
                auth = descriptor.requires_auth,
                "Bound route"
            );

            self.routes.push(BoundRoute {
                module: module.clone(),
                descriptor: descriptor.clone(),
                url,
                endpoint,
            });
        }

        Ok(self)
    }

    /// `(module, method, url, operation_id)` for every bound route, in binding order.
    pub fn bound_routes(&self) -> Vec<(String, Method, String, String)> {
        self.routes
            .iter()
            .map(|route| {
                (
                    route.module.clone(),
                    route.descriptor.method,
                    route.url.clone(),
                    route.descriptor.operation_id.clone(),
                )
            })
            .collect()
    }

    /// Build the live router. Each route also answers on its URL with a trailing slash.
    pub fn into_router(self) -> Router {
        let mut router = Router::new();

        for route in self.routes {
            let source = format!("{} {}", route.descriptor.method, route.url);
            let dispatch = Dispatch {
                source: Arc::from(source.as_str()),
                endpoint: route.endpoint,
                factory: self.factory.clone(),
            };

            let handler = move |params: Option<Path<HashMap<String, String>>>,
                                method: http::Method,
                                uri: Uri,
                                headers: HeaderMap,
                                body: Bytes| {
                let dispatch = dispatch.clone();
                async move {
                    let request = ApiRequest {
                        method,
                        uri,
                        headers,
                        path_params: params.map(|Path(params)| params).unwrap_or_default(),
                        body,
                    };
                    dispatch.handle(request).await
                }
            };

            let mut method_router = on(route.descriptor.method.filter(), handler);
            if route.descriptor.requires_auth {
                if let Some(authenticator) = &self.authenticator {
                    let gate = AuthGate::new(authenticator.clone(), self.factory.clone(), source);
                    method_router = method_router
                        .route_layer(middleware::from_fn_with_state(gate, require_auth));
                }
            }

            // Catch-all segments must stay last, so they get no alias.
            if route.url.contains("{*") {
                router = router.route(&route.url, method_router);
            } else {
                let alias = format!("{}/", route.url);
                router = router
                    .route(&route.url, method_router.clone())
                    .route(&alias, method_router);
            }
        }

        router.layer(middleware::from_fn(assign_trace))
    }
}

#[derive(Clone)]
struct Dispatch {
    source: Arc<str>,
    endpoint: Endpoint,
    factory: LoggerFactory,
}

impl Dispatch {
    async fn handle(&self, request: ApiRequest) -> Response {
        let logger = self.factory.create_logger(&*self.source);
        let endpoint = self.endpoint.clone();

        let result = AssertUnwindSafe(async move { endpoint(request).await })
            .catch_unwind()
            .await
            .unwrap_or(Err(HandlerError::Unknown));

        match result {
            Ok(value) => {
                logger.dump_info_logs();
                (StatusCode::OK, Json(value)).into_response()
            }
            Err(err) => {
                tracing::debug!(
                    source = %self.source,
                    status = %err.status(),
                    error = %err,
                    "Request failed"
                );
                logger.error(err.to_string());
                logger.dump_all_logs();
                err.into_response()
            }
        }
    }
}

/// Assign a fresh trace id to the request and bind it for everything downstream.
///
/// The id is also stored in the request extensions and echoed in the
/// `x-trace-id` response header.
pub async fn assign_trace(mut request: Request, next: Next) -> Response {
    let trace_id = TraceId::generate();
    request.extensions_mut().insert(trace_id.clone());

    let span = tracing::debug_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let mut response = trace_context::run(trace_id.clone(), next.run(request))
        .instrument(span)
        .await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
