//! Startup wiring: builds every service in dependency order and binds them.

use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::container::ServiceContainer;
use crate::error::BindError;
use crate::logger::{LogBuffer, LogSink, LoggerFactory};
use crate::routes::auth::{Authenticator, BearerTokenAuthenticator};
use crate::routes::registrar::Registrar;
use crate::services::{ArticlesService, HelloService};
use crate::store::{ArticleStore, ArticlesController};

/// A bound, ready-to-serve application.
pub struct Application {
    pub router: Router,
    /// The request log buffer, for the idle sweeper
    pub buffer: Arc<LogBuffer>,
    pub factory: LoggerFactory,
}

/// Construct the services and bind their routes. Fails before serving on any bind error.
pub fn build(
    config: &Config,
    store: Arc<dyn ArticleStore>,
    sink: Arc<dyn LogSink>,
) -> Result<Application, BindError> {
    let buffer = Arc::new(LogBuffer::new(config.buffer_limits()));
    let factory = LoggerFactory::new(buffer.clone(), sink);

    let mut container = ServiceContainer::new();
    let controller = Arc::new(ArticlesController::new(store, &factory));
    container.register(controller.clone());
    container.register(Arc::new(ArticlesService::new(controller)));
    container.register(Arc::new(HelloService::new(&factory)));

    let authenticator = config.auth_token.as_ref().map(|token| {
        Arc::new(BearerTokenAuthenticator::new(token.as_str())) as Arc<dyn Authenticator>
    });
    if authenticator.is_none() {
        tracing::warn!("No auth token configured; auth-required routes are not gated");
    }

    let mut registrar =
        Registrar::new(Arc::new(container), factory.clone()).with_authenticator(authenticator);
    registrar
        .mount::<HelloService>()?
        .mount::<ArticlesService>()?;

    Ok(Application {
        router: registrar.into_router(),
        buffer,
        factory,
    })
}
