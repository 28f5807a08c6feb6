//! Deliberate corruption of a stack's internals.
//!
//! Safe code cannot write outside a stack's live region, so the guards,
//! poison and checksum have nothing to catch unless something reaches into
//! the raw allocation. [`FaultInjector`] is that something: it is how tests
//! and the scenario harness simulate stray writes and bit flips.

use crate::stack::{Element, GuardedStack};

/// Mutable raw view over a stack, bypassing every check.
pub struct FaultInjector<'a> {
    stack: &'a mut GuardedStack,
}

impl GuardedStack {
    /// Borrow the stack for fault injection.
    pub fn fault_injector(&mut self) -> FaultInjector<'_> {
        FaultInjector { stack: self }
    }
}

impl FaultInjector<'_> {
    /// Length of the raw allocation, guard slots included. Zero after destroy.
    #[must_use]
    pub fn allocation_len(&self) -> usize {
        self.stack.buffer.as_ref().map_or(0, Vec::len)
    }

    /// Overwrite raw allocation slot `raw_index`. Returns false if it does not exist.
    pub fn write_raw(&mut self, raw_index: usize, value: Element) -> bool {
        match self
            .stack
            .buffer
            .as_mut()
            .and_then(|buffer| buffer.get_mut(raw_index))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Write one slot past the last logical slot, where the end guard sits
    /// when guards are enabled. Returns false when there is no such slot.
    pub fn write_past_end(&mut self, value: Element) -> bool {
        let raw_index = self.stack.slot_offset() + self.stack.capacity;
        self.write_raw(raw_index, value)
    }

    /// Write one slot before logical slot 0 (the begin guard). Returns false
    /// when the allocation has no guard slots.
    pub fn write_before_begin(&mut self, value: Element) -> bool {
        if self.stack.slot_offset() == 0 {
            return false;
        }
        self.write_raw(0, value)
    }

    /// XOR `0xFF` into byte `byte` (0..4, little-endian) of logical slot `index`.
    pub fn flip_byte(&mut self, index: usize, byte: usize) -> bool {
        if byte >= std::mem::size_of::<Element>() {
            return false;
        }
        let raw_index = self.stack.slot_offset() + index;
        match self
            .stack
            .buffer
            .as_mut()
            .and_then(|buffer| buffer.get_mut(raw_index))
        {
            Some(slot) => {
                let mut bytes = slot.to_le_bytes();
                bytes[byte] ^= 0xFF;
                *slot = Element::from_le_bytes(bytes);
                true
            }
            None => false,
        }
    }

    /// Overwrite the struct-held sentinels.
    pub fn set_guard_fields(&mut self, begin: Element, end: Element) {
        self.stack.guard_begin = begin;
        self.stack.guard_end = end;
    }

    /// Overwrite the live-element count.
    pub fn set_size(&mut self, size: usize) {
        self.stack.size = size;
    }

    /// Overwrite the stored checksum.
    pub fn set_checksum(&mut self, checksum: Option<u64>) {
        self.stack.checksum = checksum;
    }
}
