//! Shared service instances.
//!
//! [`ServiceContainer`] holds one shared instance per service type. It is
//! filled once at startup, in dependency order, and handed to the
//! registrar, which resolves the target service from it on every call.

use std::sync::Arc;

use http::Extensions;

/// Typed registry of shared service instances.
#[derive(Default)]
pub struct ServiceContainer {
    services: Extensions,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the shared instance of `T`, returning any instance it replaces.
    pub fn register<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> Option<Arc<T>> {
        self.services.insert(instance)
    }

    /// The shared instance of `T`, if registered.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.get::<Arc<T>>().cloned()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.get::<Arc<T>>().is_some()
    }
}
