//! Request-scoped trace identifiers.
//!
//! The current trace id is carried in a `tokio::task_local!` slot so any code
//! running inside a request's future can read it without the id being passed
//! through every call. The slot follows the future across `.await` points and
//! is never visible to other tasks running concurrently on the same worker.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Value returned when no trace scope is active.
pub const UNKNOWN_TRACE: &str = "unknown";

/// Length of generated trace identifiers.
pub const TRACE_ID_LEN: usize = 12;

/// Response header carrying the request's trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

tokio::task_local! {
    static CURRENT_TRACE: TraceId;
}

/// Identifier correlating every log record emitted while serving one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(Arc<str>);

impl TraceId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Arc::from(nanoid::nanoid!(TRACE_ID_LEN)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TraceId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for TraceId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run `body` with `trace_id` bound as the current trace, returning its output.
///
/// Nested calls shadow the outer binding for the duration of the inner future.
pub async fn run<F: Future>(trace_id: TraceId, body: F) -> F::Output {
    CURRENT_TRACE.scope(trace_id, body).await
}

/// Synchronous counterpart of [`run`].
pub fn run_sync<R>(trace_id: TraceId, body: impl FnOnce() -> R) -> R {
    CURRENT_TRACE.sync_scope(trace_id, body)
}

/// The trace bound to the running task, if any.
pub fn current() -> Option<TraceId> {
    CURRENT_TRACE.try_with(TraceId::clone).ok()
}

/// The current trace id, or [`UNKNOWN_TRACE`] outside any scope.
pub fn current_trace_id() -> String {
    CURRENT_TRACE
        .try_with(|id| id.to_string())
        .unwrap_or_else(|_| UNKNOWN_TRACE.to_string())
}

/// Wrap `fut` so it keeps the caller's trace when spawned onto another task.
///
/// `tokio::spawn` starts a fresh task-local context; background work that
/// should keep logging under the request's trace must be wrapped explicitly.
/// Such work is not flushed by the request's dump and is reclaimed only by
/// buffer eviction.
pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let trace_id = current().unwrap_or_else(|| TraceId::from(UNKNOWN_TRACE));
    CURRENT_TRACE.scope(trace_id, fut)
}
