//! Request-buffered logging.
//!
//! A [`Logger`] never performs I/O when a record is emitted: records go into
//! the shared [`LogBuffer`] under the current trace. At the end of a request
//! exactly one dump runs: [`Logger::dump_info_logs`] on success drops debug
//! and error noise, [`Logger::dump_all_logs`] on failure writes everything.
//! Both remove the trace's buffer entry.

pub mod buffer;
pub mod sink;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

pub use buffer::{BufferLimits, LogBuffer, LogLevel, LogRecord};
pub use sink::{LogSink, MemorySink, StdoutSink};

use crate::trace_context::{self, TraceId, UNKNOWN_TRACE};

/// Creates [`Logger`]s that share one buffer and one sink.
#[derive(Clone)]
pub struct LoggerFactory {
    buffer: Arc<LogBuffer>,
    sink: Arc<dyn LogSink>,
}

impl LoggerFactory {
    pub fn new(buffer: Arc<LogBuffer>, sink: Arc<dyn LogSink>) -> Self {
        Self { buffer, sink }
    }

    /// A logger whose records are tagged with `service_tag`. Cheap; create one per call site.
    #[must_use]
    pub fn create_logger(&self, service_tag: impl Into<String>) -> Logger {
        Logger {
            service_tag: Arc::from(service_tag.into()),
            buffer: self.buffer.clone(),
            sink: self.sink.clone(),
        }
    }

    pub fn buffer(&self) -> &Arc<LogBuffer> {
        &self.buffer
    }
}

/// Per-call-site handle writing into the shared buffer.
#[derive(Clone)]
pub struct Logger {
    service_tag: Arc<str>,
    buffer: Arc<LogBuffer>,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn service_tag(&self) -> &str {
        &self.service_tag
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, [message]);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, [message]);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, [message]);
    }

    /// Buffer one record made of several message parts.
    pub fn log<I, S>(&self, level: LogLevel, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = LogRecord::new(
            level,
            &*self.service_tag,
            messages.into_iter().map(Into::into).collect(),
        );
        self.buffer.add(&current_trace(), record);
    }

    /// Write the current trace's info records to the sink and drop the rest.
    pub fn dump_info_logs(&self) -> usize {
        self.dump(|record| record.level == LogLevel::Info)
    }

    /// Write every record of the current trace to the sink.
    pub fn dump_all_logs(&self) -> usize {
        self.dump(|_| true)
    }

    /// Await `fut`, buffering a debug record on success or an error record on failure.
    pub async fn observe<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let result = fut.await;
        match &result {
            Ok(_) => self.debug("Successfully completed"),
            Err(err) => self.error(err.to_string()),
        }
        result
    }

    /// Like [`Logger::observe`], but a failure record also carries `params` as JSON
    /// so the dumped line shows what the call was made with.
    pub async fn observe_with<P, T, E, F>(&self, params: &P, fut: F) -> Result<T, E>
    where
        P: Serialize + ?Sized,
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let result = fut.await;
        match &result {
            Ok(_) => self.debug("Successfully completed"),
            Err(err) => {
                let params = serde_json::to_string(params)
                    .unwrap_or_else(|e| format!("<unserializable: {e}>"));
                self.log(LogLevel::Error, [err.to_string(), "params:".to_string(), params]);
            }
        }
        result
    }

    fn dump(&self, keep: impl Fn(&LogRecord) -> bool) -> usize {
        let trace_id = current_trace();
        let records = self.buffer.take(&trace_id);
        let mut written = 0;

        for record in records.iter().filter(|record| keep(record)) {
            let line = sink::format_line(
                Utc::now(),
                record.level,
                &record.service_tag,
                &self.service_tag,
                trace_id.as_str(),
                &record.messages.join(" "),
            );
            match self.sink.write_line(&line) {
                Ok(()) => written += 1,
                Err(err) => {
                    tracing::warn!(trace_id = %trace_id, error = %err, "Failed to write log line");
                }
            }
        }

        tracing::debug!(
            trace_id = %trace_id,
            buffered = records.len(),
            written,
            "Dumped request logs"
        );
        written
    }
}

fn current_trace() -> TraceId {
    trace_context::current().unwrap_or_else(|| TraceId::from(UNKNOWN_TRACE))
}
