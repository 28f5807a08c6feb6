//! Instrumentation level and per-stack configuration.
//!
//! The process default level is set via the `GUARDSTACK_MODE` environment variable:
//! - `diagnostic`: guard sentinels, poison fill, content checksum and diagnostic
//!   dumps. Every operation runs the full validator first.
//! - `production`: no guards, no poison, no checksum. Only the cheap structural
//!   checks (`NullBuffer`, `SizeExceedsCapacity`) run before an operation.
//! - `minimal`: no validation beyond the buffer-presence check the type system
//!   forces on us.
//!
//! When the variable is unset, debug builds default to `diagnostic` and release
//! builds to `production`. `GUARDSTACK_CHECKSUM` selects the checksum algorithm
//! (`djb2` or `blake3`).

use std::sync::OnceLock;

use crate::sink::{DiagnosticSink, DumpFormat};
use crate::structured_log::LogLevel;

/// Multiplier applied to capacity when a push finds the stack full.
pub const GROWTH_FACTOR: usize = 2;

/// Occupancy ratio at or below which a pop shrinks the buffer.
pub const SHRINK_THRESHOLD: f64 = 0.3;

// Integer form of SHRINK_THRESHOLD: shrink when size * DEN <= capacity * NUM.
pub(crate) const SHRINK_NUM: usize = 3;
pub(crate) const SHRINK_DEN: usize = 10;

/// How much runtime instrumentation a stack carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentationLevel {
    /// Guards, poison, checksum and dumps. Full validation before every operation.
    Diagnostic,
    /// Structural checks only (`NullBuffer`, `SizeExceedsCapacity`).
    Production,
    /// No validation beyond buffer presence.
    Minimal,
}

impl Default for InstrumentationLevel {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Diagnostic
        } else {
            Self::Production
        }
    }
}

impl InstrumentationLevel {
    /// Parse from string (case-insensitive). Unknown values fall back to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "diagnostic" | "debug" | "full" | "checked" => Self::Diagnostic,
            "production" | "release" | "structural" => Self::Production,
            "minimal" | "off" | "none" | "unchecked" => Self::Minimal,
            _ => Self::default(),
        }
    }

    /// Stable lowercase name, used in logs and harness reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
            Self::Production => "production",
            Self::Minimal => "minimal",
        }
    }

    /// Guard sentinels are written around the allocation and checked.
    #[must_use]
    pub const fn guards_enabled(self) -> bool {
        matches!(self, Self::Diagnostic)
    }

    /// Unused and vacated slots are filled with the poison marker.
    #[must_use]
    pub const fn poison_enabled(self) -> bool {
        matches!(self, Self::Diagnostic)
    }

    /// Validation failures produce a [`StackDump`](crate::StackDump) on the sink.
    #[must_use]
    pub const fn dumps_enabled(self) -> bool {
        matches!(self, Self::Diagnostic)
    }

    /// The validator runs before each operation.
    #[must_use]
    pub const fn validation_enabled(self) -> bool {
        !matches!(self, Self::Minimal)
    }
}

/// Content checksum algorithm.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    /// DJB2 rolling hash (`h = h * 33 + b`).
    #[default]
    Djb2,
    /// First eight bytes of a BLAKE3 digest.
    Blake3,
}

impl ChecksumKind {
    /// Parse from string (case-insensitive). Unknown values fall back to DJB2.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "blake3" | "b3" | "strong" => Self::Blake3,
            _ => Self::Djb2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Djb2 => "djb2",
            Self::Blake3 => "blake3",
        }
    }
}

static GLOBAL_LEVEL: OnceLock<InstrumentationLevel> = OnceLock::new();
static GLOBAL_CHECKSUM: OnceLock<ChecksumKind> = OnceLock::new();

/// Get the process default level (reads env var on first call, caches thereafter).
#[must_use]
pub fn instrumentation_level() -> InstrumentationLevel {
    *GLOBAL_LEVEL.get_or_init(|| {
        std::env::var("GUARDSTACK_MODE")
            .map(|v| InstrumentationLevel::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// Get the process default checksum algorithm.
#[must_use]
pub fn checksum_kind() -> ChecksumKind {
    *GLOBAL_CHECKSUM.get_or_init(|| {
        std::env::var("GUARDSTACK_CHECKSUM")
            .map(|v| ChecksumKind::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// Per-stack configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct StackConfig {
    level: InstrumentationLevel,
    checksum: Option<ChecksumKind>,
    capacity_limit: Option<usize>,
    failing_allocation: Option<u64>,
    sink: DiagnosticSink,
    dump_format: DumpFormat,
    log_threshold: LogLevel,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new(instrumentation_level())
    }
}

impl StackConfig {
    /// Configuration for `level` with the process default checksum and a stderr sink.
    #[must_use]
    pub fn new(level: InstrumentationLevel) -> Self {
        Self {
            level,
            checksum: Some(checksum_kind()),
            capacity_limit: None,
            failing_allocation: None,
            sink: DiagnosticSink::default(),
            dump_format: DumpFormat::default(),
            log_threshold: LogLevel::Warn,
        }
    }

    #[must_use]
    pub fn diagnostic() -> Self {
        Self::new(InstrumentationLevel::Diagnostic)
    }

    #[must_use]
    pub fn production() -> Self {
        Self::new(InstrumentationLevel::Production)
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self::new(InstrumentationLevel::Minimal)
    }

    /// Select the checksum algorithm, or `None` to keep guards without a checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: Option<ChecksumKind>) -> Self {
        self.checksum = checksum;
        self
    }

    /// Refuse any allocation larger than `limit` element slots.
    #[must_use]
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.capacity_limit = Some(limit);
        self
    }

    /// Fail the `nth` allocation attempt a stack makes, counting from 1.
    /// Construction is attempt 1; every growth or shrink after it counts once.
    #[must_use]
    pub fn with_failing_allocation(mut self, nth: u64) -> Self {
        self.failing_allocation = Some(nth);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_dump_format(mut self, format: DumpFormat) -> Self {
        self.dump_format = format;
        self
    }

    /// Minimum level a log event needs to reach the sink.
    #[must_use]
    pub fn with_log_threshold(mut self, threshold: LogLevel) -> Self {
        self.log_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn level(&self) -> InstrumentationLevel {
        self.level
    }

    /// Active checksum algorithm. Always `None` unless guards are enabled.
    #[must_use]
    pub fn checksum(&self) -> Option<ChecksumKind> {
        if self.level.guards_enabled() {
            self.checksum
        } else {
            None
        }
    }

    #[must_use]
    pub const fn capacity_limit(&self) -> Option<usize> {
        self.capacity_limit
    }

    #[must_use]
    pub const fn failing_allocation(&self) -> Option<u64> {
        self.failing_allocation
    }

    #[must_use]
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    #[must_use]
    pub const fn dump_format(&self) -> DumpFormat {
        self.dump_format
    }

    #[must_use]
    pub const fn log_threshold(&self) -> LogLevel {
        self.log_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_instrumentation_levels() {
        assert_eq!(
            InstrumentationLevel::from_str_loose("diagnostic"),
            InstrumentationLevel::Diagnostic
        );
        assert_eq!(
            InstrumentationLevel::from_str_loose("DEBUG"),
            InstrumentationLevel::Diagnostic
        );
        assert_eq!(
            InstrumentationLevel::from_str_loose("production"),
            InstrumentationLevel::Production
        );
        assert_eq!(
            InstrumentationLevel::from_str_loose("release"),
            InstrumentationLevel::Production
        );
        assert_eq!(
            InstrumentationLevel::from_str_loose("minimal"),
            InstrumentationLevel::Minimal
        );
        assert_eq!(
            InstrumentationLevel::from_str_loose("off"),
            InstrumentationLevel::Minimal
        );
        assert_eq!(
            InstrumentationLevel::from_str_loose("bogus"),
            InstrumentationLevel::default()
        );
    }

    #[test]
    fn debug_builds_default_to_diagnostic() {
        let expected = if cfg!(debug_assertions) {
            InstrumentationLevel::Diagnostic
        } else {
            InstrumentationLevel::Production
        };
        assert_eq!(InstrumentationLevel::default(), expected);
    }

    #[test]
    fn instrumentation_only_in_diagnostic() {
        assert!(InstrumentationLevel::Diagnostic.guards_enabled());
        assert!(InstrumentationLevel::Diagnostic.poison_enabled());
        assert!(InstrumentationLevel::Diagnostic.dumps_enabled());
        assert!(!InstrumentationLevel::Production.guards_enabled());
        assert!(!InstrumentationLevel::Production.dumps_enabled());
        assert!(!InstrumentationLevel::Minimal.poison_enabled());
    }

    #[test]
    fn validation_except_minimal() {
        assert!(InstrumentationLevel::Diagnostic.validation_enabled());
        assert!(InstrumentationLevel::Production.validation_enabled());
        assert!(!InstrumentationLevel::Minimal.validation_enabled());
    }

    #[test]
    fn checksum_hidden_without_guards() {
        let cfg = StackConfig::production().with_checksum(Some(ChecksumKind::Blake3));
        assert_eq!(cfg.checksum(), None);

        let cfg = StackConfig::diagnostic().with_checksum(Some(ChecksumKind::Blake3));
        assert_eq!(cfg.checksum(), Some(ChecksumKind::Blake3));

        let cfg = StackConfig::diagnostic().with_checksum(None);
        assert_eq!(cfg.checksum(), None);
    }

    #[test]
    fn parse_checksum_kinds() {
        assert_eq!(ChecksumKind::from_str_loose("BLAKE3"), ChecksumKind::Blake3);
        assert_eq!(ChecksumKind::from_str_loose("djb2"), ChecksumKind::Djb2);
        assert_eq!(ChecksumKind::from_str_loose("???"), ChecksumKind::Djb2);
    }
}
