//! Bounded per-trace log buffer.
//!
//! Records emitted while serving a request are held here, keyed by trace id,
//! until the request dumps them. Two independent caps bound memory no matter
//! how traffic behaves:
//!
//! - at most `max_traces` traces are tracked; inserting a new trace at the cap
//!   evicts the trace that was first seen earliest
//! - each trace keeps at most `max_messages_per_trace` records; appending at
//!   the cap drops that trace's oldest record
//!
//! The map and its first-seen queue live behind a single mutex so they are
//! always updated together.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::trace_context::TraceId;

// ============================================================================
// Records
// ============================================================================

/// Default cap on the number of traces held at once.
pub const DEFAULT_MAX_TRACES: usize = 50;

/// Default cap on the number of records held per trace.
pub const DEFAULT_MAX_MESSAGES_PER_TRACE: usize = 25;

/// Severity of a buffered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    /// Upper-case label used in sink lines.
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One buffered log call. Appended once, never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Tag of the logger that produced the record
    pub service_tag: String,
    pub messages: Vec<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, service_tag: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            level,
            service_tag: service_tag.into(),
            messages,
        }
    }
}

/// Capacity limits for a [`LogBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    pub max_traces: usize,
    pub max_messages_per_trace: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_traces: DEFAULT_MAX_TRACES,
            max_messages_per_trace: DEFAULT_MAX_MESSAGES_PER_TRACE,
        }
    }
}

// ============================================================================
// Log Buffer
// ============================================================================

struct TraceEntry {
    first_seen: Instant,
    records: VecDeque<LogRecord>,
}

#[derive(Default)]
struct BufferState {
    traces: HashMap<TraceId, TraceEntry>,
    /// Keys of `traces` in first-seen order.
    order: VecDeque<TraceId>,
}

impl BufferState {
    fn evict_oldest(&mut self) -> Option<TraceId> {
        let oldest = self.order.pop_front()?;
        self.traces.remove(&oldest);
        Some(oldest)
    }

    fn detach(&mut self, trace_id: &TraceId) -> Option<TraceEntry> {
        let entry = self.traces.remove(trace_id)?;
        if let Some(pos) = self.order.iter().position(|id| id == trace_id) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

/// Shared, bounded mapping from trace id to that trace's records.
pub struct LogBuffer {
    limits: BufferLimits,
    state: Mutex<BufferState>,
}

impl LogBuffer {
    /// Create a buffer with the given limits. Zero caps are raised to one.
    #[must_use]
    pub fn new(limits: BufferLimits) -> Self {
        Self {
            limits: BufferLimits {
                max_traces: limits.max_traces.max(1),
                max_messages_per_trace: limits.max_messages_per_trace.max(1),
            },
            state: Mutex::new(BufferState::default()),
        }
    }

    pub fn limits(&self) -> BufferLimits {
        self.limits
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        // Every mutation leaves the state consistent before it can panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `record` to `trace_id`'s sequence, evicting as the caps require.
    pub fn add(&self, trace_id: &TraceId, record: LogRecord) {
        let mut state = self.state();

        if let Some(entry) = state.traces.get_mut(trace_id) {
            if entry.records.len() >= self.limits.max_messages_per_trace {
                entry.records.pop_front();
            }
            entry.records.push_back(record);
            return;
        }

        while state.traces.len() >= self.limits.max_traces {
            if state.evict_oldest().is_none() {
                break;
            }
        }

        let mut records = VecDeque::with_capacity(self.limits.max_messages_per_trace.min(8));
        records.push_back(record);
        state.traces.insert(
            trace_id.clone(),
            TraceEntry {
                first_seen: Instant::now(),
                records,
            },
        );
        state.order.push_back(trace_id.clone());
    }

    /// The records held for `trace_id`, oldest first. Empty if absent.
    pub fn get(&self, trace_id: &TraceId) -> Vec<LogRecord> {
        self.state()
            .traces
            .get(trace_id)
            .map(|entry| entry.records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Delete `trace_id`'s entry. No-op if absent.
    pub fn remove(&self, trace_id: &TraceId) {
        self.state().detach(trace_id);
    }

    /// Remove `trace_id`'s entry and return its records in one step.
    pub fn take(&self, trace_id: &TraceId) -> Vec<LogRecord> {
        self.state()
            .detach(trace_id)
            .map(|entry| entry.records.into())
            .unwrap_or_default()
    }

    /// Drop every trace first seen before `cutoff`. Returns how many were dropped.
    pub fn evict_seen_before(&self, cutoff: Instant) -> usize {
        let mut state = self.state();
        let mut evicted = 0;
        while let Some(oldest) = state.order.front() {
            let stale = state
                .traces
                .get(oldest)
                .is_none_or(|entry| entry.first_seen < cutoff);
            if !stale {
                break;
            }
            state.evict_oldest();
            evicted += 1;
        }
        evicted
    }

    /// Drop every trace that has been buffered for longer than `max_age`.
    pub fn evict_idle(&self, max_age: Duration) -> usize {
        match Instant::now().checked_sub(max_age) {
            Some(cutoff) => self.evict_seen_before(cutoff),
            None => 0,
        }
    }

    /// Number of traces currently held.
    pub fn len(&self) -> usize {
        self.state().traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked trace ids in first-seen order.
    pub fn trace_ids(&self) -> Vec<TraceId> {
        self.state().order.iter().cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(BufferLimits::default())
    }
}

// ============================================================================
// Idle Sweep
// ============================================================================

/// Periodically drop traces that were never dumped.
///
/// Requests whose work outlives the response (or that never reach the dump)
/// otherwise stay buffered until global-cap eviction pushes them out.
pub fn spawn_idle_sweeper(
    buffer: Arc<LogBuffer>,
    interval: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = buffer.evict_idle(max_age);
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = buffer.len(), "Evicted idle traces");
                    }
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, "test", vec![message.to_string()])
    }

    fn messages(records: &[LogRecord]) -> Vec<String> {
        records.iter().flat_map(|r| r.messages.clone()).collect()
    }

    fn small(max_traces: usize, max_messages_per_trace: usize) -> LogBuffer {
        LogBuffer::new(BufferLimits {
            max_traces,
            max_messages_per_trace,
        })
    }

    #[test]
    fn test_get_absent_is_empty() {
        let buffer = LogBuffer::default();
        assert!(buffer.get(&TraceId::from("missing")).is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let buffer = LogBuffer::default();
        let id = TraceId::from("t1");
        buffer.add(&id, record("a"));
        buffer.add(&id, record("b"));
        buffer.add(&id, record("c"));
        assert_eq!(messages(&buffer.get(&id)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_per_trace_cap_drops_oldest() {
        let buffer = small(10, 3);
        let id = TraceId::from("t1");
        for i in 0..5 {
            buffer.add(&id, record(&i.to_string()));
        }
        assert_eq!(messages(&buffer.get(&id)), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_global_cap_evicts_first_seen() {
        let buffer = small(2, 10);
        let (a, b, c) = (TraceId::from("a"), TraceId::from("b"), TraceId::from("c"));
        buffer.add(&a, record("a1"));
        buffer.add(&b, record("b1"));
        // Appending to an existing trace does not refresh its position.
        buffer.add(&a, record("a2"));
        buffer.add(&c, record("c1"));

        assert!(buffer.get(&a).is_empty());
        assert_eq!(buffer.trace_ids(), vec![b.clone(), c.clone()]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let buffer = LogBuffer::default();
        let id = TraceId::from("t1");
        buffer.add(&id, record("a"));
        buffer.remove(&id);
        assert!(buffer.get(&id).is_empty());
        assert!(buffer.trace_ids().is_empty());
        buffer.remove(&id);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_remove_frees_slot_for_new_trace() {
        let buffer = small(2, 10);
        let (a, b, c) = (TraceId::from("a"), TraceId::from("b"), TraceId::from("c"));
        buffer.add(&a, record("a1"));
        buffer.add(&b, record("b1"));
        buffer.remove(&a);
        buffer.add(&c, record("c1"));
        assert_eq!(buffer.trace_ids(), vec![b, c]);
    }

    #[test]
    fn test_take_returns_and_removes() {
        let buffer = LogBuffer::default();
        let id = TraceId::from("t1");
        buffer.add(&id, record("a"));
        assert_eq!(messages(&buffer.take(&id)), vec!["a"]);
        assert!(buffer.get(&id).is_empty());
        assert!(buffer.take(&id).is_empty());
    }

    #[test]
    fn test_zero_limits_are_raised() {
        let buffer = small(0, 0);
        assert_eq!(
            buffer.limits(),
            BufferLimits {
                max_traces: 1,
                max_messages_per_trace: 1
            }
        );
        let id = TraceId::from("t1");
        buffer.add(&id, record("a"));
        buffer.add(&id, record("b"));
        assert_eq!(messages(&buffer.get(&id)), vec!["b"]);
    }

    #[test]
    fn test_evict_seen_before() {
        let buffer = LogBuffer::default();
        let old = TraceId::from("old");
        buffer.add(&old, record("a"));
        let cutoff = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let fresh = TraceId::from("fresh");
        buffer.add(&fresh, record("b"));

        assert_eq!(buffer.evict_seen_before(cutoff + Duration::from_millis(1)), 1);
        assert_eq!(buffer.trace_ids(), vec![fresh]);
    }

    #[test]
    fn test_evict_idle_keeps_recent() {
        let buffer = LogBuffer::default();
        buffer.add(&TraceId::from("t1"), record("a"));
        assert_eq!(buffer.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let buffer = Arc::new(LogBuffer::default());
        buffer.add(&TraceId::from("t1"), record("a"));
        let token = CancellationToken::new();
        let handle = spawn_idle_sweeper(
            buffer.clone(),
            Duration::from_millis(5),
            Duration::ZERO,
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(buffer.is_empty());

        token.cancel();
        handle.await.unwrap();
    }

    proptest! {
        #[test]
        fn prop_global_cap_keeps_most_recent_traces(count in 1usize..200, cap in 1usize..60) {
            let buffer = small(cap, 5);
            let ids: Vec<TraceId> = (0..count)
                .map(|i| TraceId::from(format!("trace-{i}")))
                .collect();
            for id in &ids {
                buffer.add(id, record("x"));
            }
            let expected: Vec<TraceId> = ids[count.saturating_sub(cap)..].to_vec();
            prop_assert!(buffer.len() <= cap);
            prop_assert_eq!(buffer.trace_ids(), expected);
        }

        #[test]
        fn prop_per_trace_cap_keeps_most_recent_records(count in 1usize..100, cap in 1usize..30) {
            let buffer = small(5, cap);
            let id = TraceId::from("t");
            for i in 0..count {
                buffer.add(&id, record(&i.to_string()));
            }
            let expected: Vec<String> = (count.saturating_sub(cap)..count)
                .map(|i| i.to_string())
                .collect();
            prop_assert_eq!(messages(&buffer.get(&id)), expected);
        }
    }
}
