//! Optional authentication gate for routes declared with `auth`.
//!
//! The gate is attached per route, only when the route requires
//! authentication and an [`Authenticator`] is configured. Without one,
//! auth-required routes run ungated.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::header;
use http::request::Parts;

use crate::error::HttpError;
use crate::logger::LoggerFactory;

/// Decides whether a request may reach an auth-required route.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Accept the request, or fail with the error returned to the client.
    async fn authenticate(&self, parts: &Parts) -> Result<(), HttpError>;
}

/// State for [`require_auth`]: the authenticator plus what it needs to dump logs on rejection.
#[derive(Clone)]
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
    factory: LoggerFactory,
    source: Arc<str>,
}

impl AuthGate {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        factory: LoggerFactory,
        source: impl Into<String>,
    ) -> Self {
        Self {
            authenticator,
            factory,
            source: Arc::from(source.into()),
        }
    }
}

/// Route middleware running the authenticator before the handler.
///
/// A rejection short-circuits: the handler never runs, and whatever was
/// buffered for the trace so far is dumped along with the rejection reason.
pub async fn require_auth(State(gate): State<AuthGate>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    match gate.authenticator.authenticate(&parts).await {
        Ok(()) => next.run(Request::from_parts(parts, body)).await,
        Err(err) => {
            let logger = gate.factory.create_logger(&*gate.source);
            logger.error(format!("Authentication failed: {err}"));
            logger.dump_all_logs();
            err.into_response()
        }
    }
}

/// Accepts requests carrying `Authorization: Bearer <token>` with the configured token.
pub struct BearerTokenAuthenticator {
    token: String,
}

impl BearerTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticator for BearerTokenAuthenticator {
    async fn authenticate(&self, parts: &Parts) -> Result<(), HttpError> {
        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| HttpError::unauthorized("Missing or invalid Authorization header"))?;

        if presented != self.token {
            return Err(HttpError::unauthorized("Invalid bearer token"));
        }
        Ok(())
    }
}
