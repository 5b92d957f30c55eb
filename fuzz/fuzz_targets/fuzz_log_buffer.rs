#![no_main]

//! Fuzz target for the bounded log buffer.
//!
//! Drives arbitrary add/take/remove/evict sequences and checks after every
//! step that neither cap is ever exceeded and that the trace order stays in
//! sync with the held entries.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use routekit::logger::{BufferLimits, LogBuffer, LogLevel, LogRecord};
use routekit::trace_context::TraceId;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { trace: u8, level: u8, message: String },
    Take { trace: u8 },
    Remove { trace: u8 },
    EvictAll,
}

#[derive(Debug, Arbitrary)]
struct Input {
    max_traces: u8,
    max_messages_per_trace: u8,
    ops: Vec<Op>,
}

fn trace(n: u8) -> TraceId {
    TraceId::from(format!("trace-{}", n % 32))
}

fuzz_target!(|input: Input| {
    let buffer = LogBuffer::new(BufferLimits {
        max_traces: usize::from(input.max_traces),
        max_messages_per_trace: usize::from(input.max_messages_per_trace),
    });
    let limits = buffer.limits();

    for op in input.ops.into_iter().take(512) {
        match op {
            Op::Add {
                trace: n,
                level,
                message,
            } => {
                let level = match level % 3 {
                    0 => LogLevel::Debug,
                    1 => LogLevel::Info,
                    _ => LogLevel::Error,
                };
                let id = trace(n);
                buffer.add(&id, LogRecord::new(level, "fuzz", vec![message.clone()]));
                let records = buffer.get(&id);
                assert_eq!(records.last().map(|r| &r.messages[0]), Some(&message));
            }
            Op::Take { trace: n } => {
                let id = trace(n);
                buffer.take(&id);
                assert!(buffer.get(&id).is_empty());
            }
            Op::Remove { trace: n } => buffer.remove(&trace(n)),
            Op::EvictAll => {
                buffer.evict_seen_before(std::time::Instant::now());
            }
        }

        let ids = buffer.trace_ids();
        assert!(ids.len() <= limits.max_traces);
        assert_eq!(ids.len(), buffer.len());
        for id in &ids {
            let held = buffer.get(id).len();
            assert!(held >= 1 && held <= limits.max_messages_per_trace);
        }
    }
});
