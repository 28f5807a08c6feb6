//! Self-validating, dynamically-resizing stack of `i32` elements.
//!
//! A [`GuardedStack`] wraps a contiguous buffer with optional corruption
//! detectors, selected per stack by [`StackConfig`] or process-wide by the
//! `GUARDSTACK_MODE` environment variable.
//!
//! # Architecture
//!
//! - **Stack** (`stack`): construct/push/pop/destroy, growth and shrink policy
//! - **Validator** (`validator`): ordered integrity check run before each operation
//! - **Checksums** (`hash`): DJB2 and BLAKE3 digests over the raw allocation
//! - **Dumps** (`dump`): structured snapshot of a stack, text or JSON
//! - **Sinks** (`sink`): where dumps and log records go
//! - **Structured log** (`structured_log`): JSONL lifecycle events
//! - **Call sites** (`callsite`): `#[track_caller]` locations and the [`guarded_stack!`] macro
//! - **Fault injection** (`fault`): raw writes for exercising the detectors
//! - **Configuration** (`config`): instrumentation level control
//! - **Metrics** (`metrics`): atomic counters for observability
//!
//! ```
//! use guardstack::{GuardedStack, StackConfig, StackError};
//!
//! let mut stack = GuardedStack::construct_with(1, StackConfig::diagnostic()).unwrap();
//! stack.push(1).unwrap();
//! stack.push(2).unwrap();
//! assert_eq!(stack.capacity(), 2);
//! assert_eq!(stack.pop(), Ok(2));
//! assert_eq!(stack.pop(), Ok(1));
//! assert_eq!(stack.pop(), Err(StackError::Underflow));
//! ```

#![forbid(unsafe_code)]

pub mod callsite;
pub mod config;
pub mod dump;
pub mod error;
pub mod fault;
pub mod hash;
pub mod metrics;
pub mod sink;
mod stack;
pub mod structured_log;
mod validator;

pub use callsite::{CallSite, DiagnosticInfo};
pub use config::{
    ChecksumKind, GROWTH_FACTOR, InstrumentationLevel, SHRINK_THRESHOLD, StackConfig,
};
pub use dump::{SlotKind, StackDump};
pub use error::{Result, StackError, describe};
pub use fault::FaultInjector;
pub use hash::djb2;
pub use metrics::{MetricsSnapshot, StackMetrics, global_metrics};
pub use sink::{DiagnosticSink, DumpFormat, MemorySink, SharedWriter, SinkRecord};
pub use stack::{Element, GUARD_BEGIN, GUARD_END, GUARD_SLOTS, GuardedStack, POISON};
pub use structured_log::{LogEntry, LogLevel};
pub use validator::validate;
