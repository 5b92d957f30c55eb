//! Durable destinations for dumped log lines.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};

use super::buffer::LogLevel;

/// Line-oriented destination for dumped records.
pub trait LogSink: Send + Sync {
    /// Write one complete line (without trailing newline).
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Writes each line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")
    }
}

/// Keeps every line in memory. Useful for tests and diagnostics endpoints.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Render one sink line:
/// `[timestamp] LEVEL (service=..., source=..., traceId=...) - message`.
pub fn format_line(
    timestamp: DateTime<Utc>,
    level: LogLevel,
    service: &str,
    source: &str,
    trace_id: &str,
    message: &str,
) -> String {
    format!(
        "[{}] {} (service={}, source={}, traceId={}) - {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        level.label(),
        service,
        source,
        trace_id,
        message
    )
}
