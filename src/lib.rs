//! Routekit - declarative HTTP routing with request-scoped, bounded log buffering.
//!
//! Services declare their routes once; the [`routes::registrar::Registrar`]
//! binds them to an axum router. Every request runs inside its own trace
//! (see [`trace_context`]), and everything logged through a
//! [`logger::Logger`] during that request is held in a bounded
//! [`logger::LogBuffer`] until the request finishes:
//!
//! - **Success:** only `INFO` records are written to the sink.
//! - **Failure:** every buffered record is written, then the error response is sent.
//!
//! Either way the trace is removed from the buffer.

pub mod app;
pub mod config;
pub mod container;
pub mod error;
pub mod logger;
pub mod routes;
pub mod schemas;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod trace_context;
