//! Log sinks for captured worker output
//!
//! Output capture hands every line to a [`LogSink`]. The default
//! [`TracingSink`] forwards lines to the process-wide `tracing` subscriber;
//! [`LogRing`] keeps a bounded window of recent lines in memory;
//! [`TeeSink`] fans out to several.

use schema::LogLine;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Destination for attributed output lines
pub trait LogSink: Send + Sync {
    /// Consume one line. Must not block for long: capture readers call this
    /// inline while draining the process pipes.
    fn record(&self, line: LogLine);
}

/// Forwards lines to `tracing` with `worker` and `stream` fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, line: LogLine) {
        info!(
            target: "corral::output",
            worker = %line.worker,
            stream = %line.stream,
            "{}",
            line.text
        );
    }
}

/// Sends every line to each of the wrapped sinks
#[derive(Clone, Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for TeeSink {
    fn record(&self, line: LogLine) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(line.clone());
            }
            last.record(line);
        }
    }
}

/// A bounded-capacity ring buffer of recent output lines.
///
/// When capacity is exceeded the oldest line is dropped.
#[derive(Debug)]
pub struct LogRing {
    capacity: usize,
    entries: VecDeque<LogLine>,
}

impl LogRing {
    /// Create a new `LogRing` with the given capacity (must be > 0)
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LogRing capacity must be > 0");
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Create a ring ready to be shared between capture tasks
    pub fn shared(capacity: usize) -> Arc<Mutex<LogRing>> {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Push a line, evicting the oldest one if the ring is full
    pub fn push(&mut self, line: LogLine) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retained lines for one worker, oldest first
    pub fn lines_for(&self, worker: &str) -> Vec<LogLine> {
        self.entries
            .iter()
            .filter(|line| line.worker == worker)
            .cloned()
            .collect()
    }

    /// The newest `limit` retained lines for one worker, oldest first
    pub fn tail_for(&self, worker: &str, limit: usize) -> Vec<LogLine> {
        let mut lines = self.lines_for(worker);
        let skip = lines.len().saturating_sub(limit);
        lines.drain(..skip);
        lines
    }
}

impl LogSink for Mutex<LogRing> {
    fn record(&self, line: LogLine) {
        // A poisoned ring still holds valid entries
        let mut ring = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ring.push(line);
    }
}
