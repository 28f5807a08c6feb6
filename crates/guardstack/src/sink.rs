//! Destinations for diagnostic dumps and structured log records.
//!
//! Output is advisory: write errors are swallowed and never reach the caller
//! of a stack operation.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dump::StackDump;
use crate::structured_log::LogEntry;

/// Rendering used for dumps written to text streams.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    /// Multi-line human-readable block.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// One item delivered to a sink.
#[derive(Debug, Clone)]
pub enum SinkRecord {
    Dump(Box<StackDump>),
    Log(LogEntry),
}

/// In-memory sink; clones share the same record buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record received so far.
    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn dumps(&self) -> Vec<StackDump> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match record {
                SinkRecord::Dump(dump) => Some(dump.as_ref().clone()),
                SinkRecord::Log(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match record {
                SinkRecord::Log(entry) => Some(entry.clone()),
                SinkRecord::Dump(_) => None,
            })
            .collect()
    }

    /// Events of all received log records, in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.logs().into_iter().map(|entry| entry.event).collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, record: SinkRecord) {
        self.records.lock().push(record);
    }
}

/// Shared byte stream (a file, a `Vec<u8>`, a socket...).
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedWriter {
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.inner.lock().flush()
    }

    fn write_line(&self, line: &str) {
        let mut guard = self.inner.lock();
        let _ = writeln!(guard, "{line}");
    }
}

impl fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedWriter").finish_non_exhaustive()
    }
}

/// Where a stack sends its dumps and log records.
#[derive(Debug, Clone, Default)]
pub enum DiagnosticSink {
    /// Process stderr.
    #[default]
    Stderr,
    /// Retained in memory for inspection.
    Memory(MemorySink),
    /// Written to a shared stream.
    Writer(SharedWriter),
    /// Discarded.
    Silent,
}

impl DiagnosticSink {
    /// Fresh in-memory sink plus a handle to read it back.
    #[must_use]
    pub fn memory() -> (Self, MemorySink) {
        let memory = MemorySink::new();
        (Self::Memory(memory.clone()), memory)
    }

    pub fn emit_dump(&self, dump: &StackDump, format: DumpFormat) {
        match self {
            Self::Silent => {}
            Self::Memory(memory) => memory.push(SinkRecord::Dump(Box::new(dump.clone()))),
            Self::Stderr => {
                let text = render(dump, format);
                let mut err = std::io::stderr().lock();
                let _ = writeln!(err, "{text}");
            }
            Self::Writer(writer) => writer.write_line(&render(dump, format)),
        }
    }

    pub fn emit_log(&self, entry: &LogEntry) {
        match self {
            Self::Silent => {}
            Self::Memory(memory) => memory.push(SinkRecord::Log(entry.clone())),
            Self::Stderr => {
                if let Ok(line) = entry.to_jsonl() {
                    let mut err = std::io::stderr().lock();
                    let _ = writeln!(err, "{line}");
                }
            }
            Self::Writer(writer) => {
                if let Ok(line) = entry.to_jsonl() {
                    writer.write_line(&line);
                }
            }
        }
    }
}

fn render(dump: &StackDump, format: DumpFormat) -> String {
    match format {
        DumpFormat::Text => dump.to_string(),
        DumpFormat::Json => dump.to_json().unwrap_or_else(|_| dump.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_log::LogLevel;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn memory_sink_clones_share_records() {
        let (sink, memory) = DiagnosticSink::memory();
        let copy = sink.clone();
        copy.emit_log(&LogEntry::new(LogLevel::Info, "stack_constructed"));
        sink.emit_log(&LogEntry::new(LogLevel::Debug, "stack_grown"));
        assert_eq!(memory.events(), vec!["stack_constructed", "stack_grown"]);
        memory.clear();
        assert!(memory.records().is_empty());
    }

    #[test]
    fn writer_sink_emits_jsonl() {
        let capture = Capture::default();
        let sink = DiagnosticSink::Writer(SharedWriter::new(capture.clone()));
        sink.emit_log(&LogEntry::new(LogLevel::Warn, "allocation_failed"));
        sink.emit_log(&LogEntry::new(LogLevel::Info, "underflow"));

        let bytes = capture.0.lock().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first = LogEntry::from_jsonl(lines[0]).unwrap();
        assert_eq!(first.event, "allocation_failed");
        assert_eq!(first.level, LogLevel::Warn);
    }

    #[test]
    fn silent_sink_discards() {
        DiagnosticSink::Silent.emit_log(&LogEntry::new(LogLevel::Error, "ignored"));
    }
}
