//! Atomic counters for stack observability.
//!
//! All counters use relaxed ordering; they are advisory, not synchronization
//! primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::StackError;

/// Process-wide stack operation counters.
pub struct StackMetrics {
    /// Stacks successfully constructed.
    pub constructs: AtomicU64,
    /// Stacks destroyed (first destroy only).
    pub destroys: AtomicU64,
    /// Successful pushes.
    pub pushes: AtomicU64,
    /// Successful pops.
    pub pops: AtomicU64,
    /// Validator runs.
    pub validations: AtomicU64,
    /// Validator runs that reported a sentinel mismatch.
    pub guard_failures: AtomicU64,
    /// Validator runs that reported a checksum mismatch.
    pub checksum_failures: AtomicU64,
    /// Validator runs that reported any other structural failure.
    pub structural_failures: AtomicU64,
    /// Buffer growths.
    pub grows: AtomicU64,
    /// Buffer shrinks.
    pub shrinks: AtomicU64,
    /// Shrinks that could not be satisfied (pop still succeeded).
    pub shrink_failures: AtomicU64,
    /// Construct/grow allocations that failed.
    pub allocation_failures: AtomicU64,
    /// Pops from an empty stack.
    pub underflows: AtomicU64,
    /// Diagnostic dumps emitted.
    pub dumps: AtomicU64,
}

impl StackMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            constructs: AtomicU64::new(0),
            destroys: AtomicU64::new(0),
            pushes: AtomicU64::new(0),
            pops: AtomicU64::new(0),
            validations: AtomicU64::new(0),
            guard_failures: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            structural_failures: AtomicU64::new(0),
            grows: AtomicU64::new(0),
            shrinks: AtomicU64::new(0),
            shrink_failures: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            underflows: AtomicU64::new(0),
            dumps: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Count a validator failure under the matching bucket.
    pub fn record_validation_failure(&self, err: StackError) {
        match err {
            StackError::GuardCorrupted => Self::inc(&self.guard_failures),
            StackError::ChecksumMismatch => Self::inc(&self.checksum_failures),
            _ => Self::inc(&self.structural_failures),
        }
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            constructs: Self::get(&self.constructs),
            destroys: Self::get(&self.destroys),
            pushes: Self::get(&self.pushes),
            pops: Self::get(&self.pops),
            validations: Self::get(&self.validations),
            guard_failures: Self::get(&self.guard_failures),
            checksum_failures: Self::get(&self.checksum_failures),
            structural_failures: Self::get(&self.structural_failures),
            grows: Self::get(&self.grows),
            shrinks: Self::get(&self.shrinks),
            shrink_failures: Self::get(&self.shrink_failures),
            allocation_failures: Self::get(&self.allocation_failures),
            underflows: Self::get(&self.underflows),
            dumps: Self::get(&self.dumps),
        }
    }
}

impl Default for StackMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all stack counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub constructs: u64,
    pub destroys: u64,
    pub pushes: u64,
    pub pops: u64,
    pub validations: u64,
    pub guard_failures: u64,
    pub checksum_failures: u64,
    pub structural_failures: u64,
    pub grows: u64,
    pub shrinks: u64,
    pub shrink_failures: u64,
    pub allocation_failures: u64,
    pub underflows: u64,
    pub dumps: u64,
}

/// Global metrics instance.
static GLOBAL_METRICS: StackMetrics = StackMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn global_metrics() -> &'static StackMetrics {
    &GLOBAL_METRICS
}
