//! Pluggable sinks for encoded envelopes
//!
//! A sink receives fully encoded lines and is the only component that
//! touches the output. The default is the append-only JSONL file; an
//! in-memory sink and a null sink are provided for tests and embedding.
//!
//! # Example
//!
//! ```rust
//! use telemetry_core::storage::{TelemetrySink, MemorySink};
//!
//! let sink = MemorySink::new();
//! sink.append_line(r#"{"event":"A","ts_ms":1,"session_id":"s","payload":{}}"#).unwrap();
//! assert_eq!(sink.len(), 1);
//! ```

mod jsonl;

use std::path::Path;
use std::sync::RwLock;

use crate::error::{Result, TelemetryError};

pub use jsonl::{JsonlFileSink, DEFAULT_LOCK_TIMEOUT};

/// Destination for encoded envelope lines
///
/// All methods take `&self`; implementations serialize concurrent callers
/// internally so that lines are never interleaved.
pub trait TelemetrySink: Send + Sync {
    /// Prepare the destination. Must be idempotent.
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Append one line. The sink adds the line terminator.
    fn append_line(&self, line: &str) -> Result<()>;

    /// Push buffered data to durable storage
    fn flush(&self) -> Result<()>;

    /// Flush and release underlying resources
    fn close(&self) -> Result<()> {
        self.flush()
    }

    /// Backing file, if there is one
    fn location(&self) -> Option<&Path> {
        None
    }

    /// Sink name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// In-memory sink
///
/// Keeps every appended line. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: RwLock<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines appended so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lines.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.write() {
            lines.clear();
        }
    }
}

impl TelemetrySink for MemorySink {
    fn append_line(&self, line: &str) -> Result<()> {
        let mut lines = self.lines.write().map_err(|_| TelemetryError::StorageLocked)?;
        lines.push(line.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Null sink (discards all lines)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for NullSink {
    fn append_line(&self, _line: &str) -> Result<()> {
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.append_line("one").unwrap();
        sink.append_line("two").unwrap();
        assert_eq!(sink.lines(), vec!["one".to_string(), "two".to_string()]);
        assert!(sink.location().is_none());

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_memory_sink_concurrent() {
        let sink = Arc::new(MemorySink::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        sink.append_line(&format!("{}-{}", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 400);
    }

    #[test]
    fn test_null_sink() {
        let sink = NullSink::new();
        sink.ensure_ready().unwrap();
        sink.append_line("discarded").unwrap();
        sink.close().unwrap();
        assert_eq!(sink.name(), "null");
    }
}
