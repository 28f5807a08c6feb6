//! Structured JSONL log records for stack lifecycle events.
//!
//! Required fields: `timestamp`, `trace_id`, `level`, `event`. Everything
//! else is optional and omitted from the JSON when unset.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::StackError;

/// Severity level for log entries. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Canonical structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    /// Instrumentation level of the emitting stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Stack operation (`construct`, `push`, `pop`, `destroy`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Declared variable name of the stack, when captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Call site of the operation (`file:line:column`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// [`StackError::code`] of the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

static NEXT_TRACE: AtomicU64 = AtomicU64::new(1);

impl LogEntry {
    /// Create a new log entry with required fields only and a fresh trace id.
    #[must_use]
    pub fn new(level: LogLevel, event: impl Into<String>) -> Self {
        let seq = NEXT_TRACE.fetch_add(1, Ordering::Relaxed);
        Self::with_trace_id(format!("guardstack::{seq:06}"), level, event)
    }

    /// Create a new log entry with an explicit trace id.
    #[must_use]
    pub fn with_trace_id(
        trace_id: impl Into<String>,
        level: LogLevel,
        event: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            mode: None,
            operation: None,
            stack: None,
            site: None,
            error: None,
            size: None,
            capacity: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, name: impl Into<String>) -> Self {
        self.stack = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: StackError) -> Self {
        self.error = Some(error.code().to_string());
        self
    }

    /// Set size and capacity.
    #[must_use]
    pub fn with_shape(mut self, size: usize, capacity: usize) -> Self {
        self.size = Some(size);
        self.capacity = Some(capacity);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a single JSONL line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    let (year, month, day) = civil_from_days(secs / 86_400);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}

// Days since 1970-01-01 to (year, month, day), proleptic Gregorian.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::with_trace_id("guardstack::test::001", LogLevel::Info, "stack_grown");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "guardstack::test::001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "stack_grown");
        assert!(parsed.get("operation").is_none());
        assert!(parsed.get("details").is_none());
    }

    #[test]
    fn log_entry_round_trips_optional_fields() {
        let entry = LogEntry::new(LogLevel::Error, "validation_failed")
            .with_mode("diagnostic")
            .with_operation("push")
            .with_stack("stk")
            .with_error(StackError::GuardCorrupted)
            .with_shape(3, 4)
            .with_details(serde_json::json!({ "guard": "end" }));
        let back = LogEntry::from_jsonl(&entry.to_jsonl().unwrap()).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.error.as_deref(), Some("guard_corrupted"));
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn trace_ids_are_unique() {
        let a = LogEntry::new(LogLevel::Info, "a");
        let b = LogEntry::new(LogLevel::Info, "b");
        assert_ne!(a.trace_id, b.trace_id);
    }

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        // 2000-03-01
        assert_eq!(civil_from_days(11_017), (2000, 3, 1));
        // 2024-02-29
        assert_eq!(civil_from_days(19_782), (2024, 2, 29));
    }

    #[test]
    fn timestamp_shape() {
        let ts = now_utc();
        assert_eq!(ts.len(), "1970-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
    }
}
