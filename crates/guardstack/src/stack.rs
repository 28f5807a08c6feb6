//! The guarded LIFO container.
//!
//! Allocation layout with guards enabled:
//!
//! ```text
//! [GUARD_BEGIN | slot 0 | slot 1 | ... | slot capacity-1 | GUARD_END]
//!                `---- live [0, size) ----'`-- reserved --'
//! ```
//!
//! Without guards the allocation is exactly `capacity` slots. Reserved slots
//! hold [`POISON`] when poisoning is enabled, zero otherwise.

use serde_json::json;

use crate::callsite::{CallSite, DiagnosticInfo};
use crate::config::{GROWTH_FACTOR, SHRINK_DEN, SHRINK_NUM, StackConfig};
use crate::dump::StackDump;
use crate::error::{Result, StackError};
use crate::metrics::{StackMetrics, global_metrics};
use crate::structured_log::{LogEntry, LogLevel};

/// Element type stored by the stack.
pub type Element = i32;

/// Marker written into reserved and vacated slots.
pub const POISON: Element = 0xCAFE_BABE_u32 as Element;

/// Sentinel stored before the first slot and in the struct.
pub const GUARD_BEGIN: Element = 0x8BAD_F00D_u32 as Element;

/// Sentinel stored after the last slot and in the struct.
pub const GUARD_END: Element = 0xDEAD_C0DE_u32 as Element;

/// Extra slots an allocation carries when guards are enabled.
pub const GUARD_SLOTS: usize = 2;

/// Dynamically-resizing stack of [`Element`]s with optional corruption detection.
///
/// Every mutating operation runs the validator first (unless the level is
/// [`Minimal`](crate::InstrumentationLevel::Minimal)) and refuses to touch a
/// stack that fails it. Failures are returned, and in diagnostic builds also
/// dumped to the configured [`DiagnosticSink`](crate::DiagnosticSink).
#[derive(Debug)]
pub struct GuardedStack {
    pub(crate) buffer: Option<Vec<Element>>,
    pub(crate) size: usize,
    pub(crate) capacity: usize,
    pub(crate) min_capacity: usize,
    pub(crate) guard_begin: Element,
    pub(crate) guard_end: Element,
    pub(crate) checksum: Option<u64>,
    pub(crate) allocations: u64,
    pub(crate) info: DiagnosticInfo,
    pub(crate) config: StackConfig,
}

impl GuardedStack {
    /// Construct with the process default configuration.
    #[track_caller]
    pub fn construct(capacity: usize) -> Result<Self> {
        Self::construct_with(capacity, StackConfig::default())
    }

    /// Construct with an explicit configuration.
    #[track_caller]
    pub fn construct_with(capacity: usize, config: StackConfig) -> Result<Self> {
        Self::construct_named(capacity, config, DiagnosticInfo::anonymous(CallSite::caller()))
    }

    /// Construct with an explicit configuration and construction record.
    ///
    /// Zero capacity is rejected with [`StackError::NullStack`]. If the
    /// allocation cannot be satisfied the error is
    /// [`StackError::AllocationFailed`] and nothing is returned.
    pub fn construct_named(
        capacity: usize,
        config: StackConfig,
        info: DiagnosticInfo,
    ) -> Result<Self> {
        let mut stack = Self {
            buffer: None,
            size: 0,
            capacity: 0,
            min_capacity: capacity,
            guard_begin: 0,
            guard_end: 0,
            checksum: None,
            allocations: 0,
            info,
            config,
        };
        let site = info.site;

        if capacity == 0 {
            stack.report(
                "validation_failed",
                "construct",
                site,
                StackError::NullStack,
                "zero initial capacity",
            );
            return Err(StackError::NullStack);
        }

        let buffer = match stack
            .count_allocation()
            .and_then(|()| stack.allocate(capacity, &[]))
        {
            Ok(buffer) => buffer,
            Err(err) => {
                StackMetrics::inc(&global_metrics().allocation_failures);
                stack.report(
                    "allocation_failed",
                    "construct",
                    site,
                    err,
                    "failed to allocate buffer",
                );
                return Err(err);
            }
        };

        stack.buffer = Some(buffer);
        stack.capacity = capacity;
        if stack.guards() {
            stack.guard_begin = GUARD_BEGIN;
            stack.guard_end = GUARD_END;
        }
        stack.refresh_checksum();

        StackMetrics::inc(&global_metrics().constructs);
        stack.log(LogLevel::Debug, "stack_constructed", "construct", site, |entry| entry);
        Ok(stack)
    }

    /// Push `value`, doubling the capacity first if the stack is full.
    ///
    /// A failed growth returns [`StackError::AllocationFailed`] and leaves the
    /// stack exactly as it was.
    #[track_caller]
    pub fn push(&mut self, value: Element) -> Result<()> {
        let site = CallSite::caller();
        self.check("push", site)?;

        self.check_bounds("push", site)?;
        if self.size == self.capacity {
            self.grow(site)?;
        }

        let index = self.slot_offset() + self.size;
        let slot = self
            .buffer
            .as_mut()
            .and_then(|buffer| buffer.get_mut(index))
            .ok_or(StackError::SizeExceedsCapacity)?;
        *slot = value;
        self.size += 1;
        self.refresh_checksum();

        StackMetrics::inc(&global_metrics().pushes);
        Ok(())
    }

    /// Pop the most recently pushed value.
    ///
    /// May shrink the buffer afterwards. A shrink that cannot be satisfied is
    /// reported to the sink but does not fail the pop.
    #[track_caller]
    pub fn pop(&mut self) -> Result<Element> {
        let site = CallSite::caller();
        self.check("pop", site)?;

        if self.size == 0 {
            StackMetrics::inc(&global_metrics().underflows);
            self.report(
                "underflow",
                "pop",
                site,
                StackError::Underflow,
                "attempted to pop from empty stack",
            );
            return Err(StackError::Underflow);
        }

        self.check_bounds("pop", site)?;
        let index = self.slot_offset() + self.size - 1;
        let poison = self.config.level().poison_enabled();
        let slot = self
            .buffer
            .as_mut()
            .and_then(|buffer| buffer.get_mut(index))
            .ok_or(StackError::SizeExceedsCapacity)?;
        let value = *slot;
        if poison {
            *slot = POISON;
        }
        self.size -= 1;
        self.refresh_checksum();

        if self.maybe_shrink(site) {
            self.refresh_checksum();
        }

        StackMetrics::inc(&global_metrics().pops);
        Ok(value)
    }

    /// Release the allocation and zero the stack.
    ///
    /// Runs even when the stack is corrupted (a dump is emitted first in
    /// diagnostic builds). Calling it again is a no-op.
    #[track_caller]
    pub fn destroy(&mut self) {
        if self.buffer.is_none() {
            return;
        }
        let site = CallSite::caller();
        if self.config.level().validation_enabled() {
            if let Err(err) = self.validate() {
                global_metrics().record_validation_failure(err);
                self.report(
                    "validation_failed",
                    "destroy",
                    site,
                    err,
                    "destroying a corrupted stack",
                );
            }
        }

        self.buffer = None;
        self.size = 0;
        self.capacity = 0;
        self.checksum = None;

        StackMetrics::inc(&global_metrics().destroys);
        self.log(LogLevel::Debug, "stack_destroyed", "destroy", site, |entry| entry);
    }

    /// Capture a dump of the current state without any failure attached.
    #[track_caller]
    #[must_use]
    pub fn dump(&self) -> StackDump {
        StackDump::capture(self, None, "requested dump", "dump", Some(CallSite::caller()))
    }

    /// Capture a dump and send it to the configured sink.
    #[track_caller]
    pub fn dump_to_sink(&self) {
        let dump = StackDump::capture(self, None, "requested dump", "dump", Some(CallSite::caller()));
        self.config.sink().emit_dump(&dump, self.config.dump_format());
        StackMetrics::inc(&global_metrics().dumps);
    }

    /// Count of live elements.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Count of allocated element slots, excluding guard slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity the stack never shrinks below.
    #[must_use]
    pub const fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True once [`destroy`](Self::destroy) has run.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Last stored checksum, when checksumming is active.
    #[must_use]
    pub const fn checksum(&self) -> Option<u64> {
        self.checksum
    }

    /// Construction record.
    #[must_use]
    pub const fn info(&self) -> &DiagnosticInfo {
        &self.info
    }

    #[must_use]
    pub const fn config(&self) -> &StackConfig {
        &self.config
    }

    pub(crate) fn guards(&self) -> bool {
        self.config.level().guards_enabled()
    }

    /// Raw index of logical slot 0.
    pub(crate) fn slot_offset(&self) -> usize {
        usize::from(self.guards())
    }

    pub(crate) fn refresh_checksum(&mut self) {
        self.checksum = match (self.config.checksum(), self.buffer.as_deref()) {
            (Some(kind), Some(buffer)) => Some(kind.digest_slots(buffer)),
            _ => None,
        };
    }

    fn check(&self, operation: &'static str, site: CallSite) -> Result<()> {
        let outcome = if self.config.level().validation_enabled() {
            StackMetrics::inc(&global_metrics().validations);
            let outcome = self.validate();
            if let Err(err) = outcome {
                global_metrics().record_validation_failure(err);
            }
            outcome
        } else if self.buffer.is_none() {
            Err(StackError::NullBuffer)
        } else {
            Ok(())
        };

        if let Err(err) = outcome {
            self.report("validation_failed", operation, site, err, failure_message(err));
        }
        outcome
    }

    /// Refuse a stored size the buffer cannot hold. Only reachable when the
    /// validator is skipped.
    fn check_bounds(&self, operation: &'static str, site: CallSite) -> Result<()> {
        if self.size <= self.capacity {
            return Ok(());
        }
        let err = StackError::SizeExceedsCapacity;
        global_metrics().record_validation_failure(err);
        self.report("validation_failed", operation, site, err, failure_message(err));
        Err(err)
    }

    fn grow(&mut self, site: CallSite) -> Result<()> {
        let from = self.capacity;
        let grown = from
            .checked_mul(GROWTH_FACTOR)
            .ok_or(StackError::AllocationFailed)
            .and_then(|target| self.reallocate(target));

        match grown {
            Ok(()) => {
                StackMetrics::inc(&global_metrics().grows);
                self.log(LogLevel::Debug, "stack_grown", "push", site, |entry| {
                    entry.with_details(json!({ "from": from, "to": self.capacity }))
                });
                Ok(())
            }
            Err(StackError::AllocationFailed) => {
                let err = StackError::AllocationFailed;
                StackMetrics::inc(&global_metrics().allocation_failures);
                self.report("allocation_failed", "push", site, err, "failed to grow buffer");
                Err(err)
            }
            Err(err) => {
                global_metrics().record_validation_failure(err);
                self.report("validation_failed", "push", site, err, failure_message(err));
                Err(err)
            }
        }
    }

    /// Returns true when the buffer was replaced.
    fn maybe_shrink(&mut self, site: CallSite) -> bool {
        if self.capacity <= self.min_capacity
            || self.size.saturating_mul(SHRINK_DEN) > self.capacity.saturating_mul(SHRINK_NUM)
        {
            return false;
        }

        let from = self.capacity;
        let target = (from / GROWTH_FACTOR)
            .max(self.min_capacity)
            .max(self.size);

        match self.reallocate(target) {
            Ok(()) => {
                StackMetrics::inc(&global_metrics().shrinks);
                self.log(LogLevel::Debug, "stack_shrunk", "pop", site, |entry| {
                    entry.with_details(json!({ "from": from, "to": self.capacity }))
                });
                true
            }
            Err(err) => {
                StackMetrics::inc(&global_metrics().shrink_failures);
                self.report("shrink_failed", "pop", site, err, "failed to shrink buffer");
                false
            }
        }
    }

    /// Move the live elements into a fresh allocation of `new_capacity` slots.
    ///
    /// The old buffer is only replaced once the new one is fully built, so a
    /// failure leaves buffer, size and capacity untouched.
    fn reallocate(&mut self, new_capacity: usize) -> Result<()> {
        if self.buffer.is_none() {
            return Err(StackError::NullBuffer);
        }
        if self.size > new_capacity {
            return Err(StackError::SizeExceedsCapacity);
        }
        self.count_allocation()?;

        let fresh = {
            let buffer = self.buffer.as_deref().ok_or(StackError::NullBuffer)?;
            let start = self.slot_offset();
            let live = buffer
                .get(start..start + self.size)
                .ok_or(StackError::SizeExceedsCapacity)?;
            self.allocate(new_capacity, live)?
        };

        self.buffer = Some(fresh);
        self.capacity = new_capacity;
        Ok(())
    }

    /// Count one allocation attempt, failing it if the config says so.
    fn count_allocation(&mut self) -> Result<()> {
        self.allocations = self.allocations.saturating_add(1);
        if self.config.failing_allocation() == Some(self.allocations) {
            return Err(StackError::AllocationFailed);
        }
        Ok(())
    }

    /// Build an allocation for `capacity` slots holding `live` at the bottom.
    fn allocate(&self, capacity: usize, live: &[Element]) -> Result<Vec<Element>> {
        if self
            .config
            .capacity_limit()
            .is_some_and(|limit| capacity > limit)
        {
            return Err(StackError::AllocationFailed);
        }

        let guards = self.guards();
        let overhead = if guards { GUARD_SLOTS } else { 0 };
        let len = capacity
            .checked_add(overhead)
            .ok_or(StackError::AllocationFailed)?;

        let mut fresh: Vec<Element> = Vec::new();
        fresh
            .try_reserve_exact(len)
            .map_err(|_| StackError::AllocationFailed)?;

        let fill = if self.config.level().poison_enabled() {
            POISON
        } else {
            0
        };
        if guards {
            fresh.push(GUARD_BEGIN);
        }
        fresh.extend_from_slice(live);
        fresh.resize(usize::from(guards) + capacity, fill);
        if guards {
            fresh.push(GUARD_END);
        }
        Ok(fresh)
    }

    /// Dump (diagnostic builds) and log a failure.
    fn report(
        &self,
        event: &'static str,
        operation: &'static str,
        site: CallSite,
        err: StackError,
        message: &str,
    ) {
        if self.config.level().dumps_enabled() {
            let dump = StackDump::capture(self, Some(err), message, operation, Some(site));
            self.config.sink().emit_dump(&dump, self.config.dump_format());
            StackMetrics::inc(&global_metrics().dumps);
        }

        let severity = match err {
            StackError::Underflow => LogLevel::Info,
            StackError::AllocationFailed => LogLevel::Warn,
            _ => LogLevel::Error,
        };
        self.log(severity, event, operation, site, |entry| {
            entry
                .with_error(err)
                .with_details(json!({ "message": message }))
        });
    }

    fn log(
        &self,
        severity: LogLevel,
        event: &str,
        operation: &str,
        site: CallSite,
        decorate: impl FnOnce(LogEntry) -> LogEntry,
    ) {
        if severity < self.config.log_threshold() {
            return;
        }
        let mut entry = LogEntry::new(severity, event)
            .with_mode(self.config.level().as_str())
            .with_operation(operation)
            .with_site(site.to_string())
            .with_shape(self.size, self.capacity);
        if let Some(name) = self.info.var_name {
            entry = entry.with_stack(name);
        }
        self.config.sink().emit_log(&decorate(entry));
    }
}

fn failure_message(err: StackError) -> &'static str {
    match err {
        StackError::NullStack => "passed null stack",
        StackError::NullBuffer => "operation on destroyed or unconstructed stack",
        StackError::GuardCorrupted => "guard sentinel overwritten",
        StackError::ChecksumMismatch => "contents changed outside push/pop",
        StackError::SizeExceedsCapacity => "size exceeds capacity",
        StackError::AllocationFailed => "memory allocation failed",
        StackError::Underflow => "attempted to pop from empty stack",
    }
}
