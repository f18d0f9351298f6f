//! Destination for producer log lines.

use parking_lot::Mutex;

/// Receives `event.data.log.entry` lines from the producer.
pub trait LogSink: Send + Sync {
    /// Record one log line.
    fn log(&self, entry: &str);
}

/// Emits producer log lines through `tracing` under the `producer` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, entry: &str) {
        tracing::info!(target: "producer", "{entry}");
    }
}

/// Keeps producer log lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Lines recorded so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, entry: &str) {
        self.entries.lock().push(entry.to_owned());
    }
}
