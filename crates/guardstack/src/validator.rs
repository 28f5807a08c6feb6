//! Structural integrity check run before every stack operation.
//!
//! Checks run in a fixed order and the first failure wins: stack presence,
//! buffer presence, guard sentinels, content checksum, then `size <= capacity`.

use crate::error::{Result, StackError};
use crate::stack::{GUARD_BEGIN, GUARD_END, GuardedStack};

/// Validate an optional stack reference.
///
/// `None` yields [`StackError::NullStack`]; otherwise identical to
/// [`GuardedStack::validate`].
pub fn validate(stack: Option<&GuardedStack>) -> Result<()> {
    stack.ok_or(StackError::NullStack)?.validate()
}

impl GuardedStack {
    /// Run the validator for this stack's instrumentation level.
    ///
    /// Guard and checksum checks only apply when guards are enabled.
    pub fn validate(&self) -> Result<()> {
        let buffer = self.buffer.as_deref().ok_or(StackError::NullBuffer)?;

        if self.guards() {
            let fields_intact = self.guard_begin == GUARD_BEGIN && self.guard_end == GUARD_END;
            let slots_intact =
                buffer.first() == Some(&GUARD_BEGIN) && buffer.last() == Some(&GUARD_END);
            if !(fields_intact && slots_intact) {
                return Err(StackError::GuardCorrupted);
            }

            if let Some(kind) = self.config.checksum() {
                if self.checksum != Some(kind.digest_slots(buffer)) {
                    return Err(StackError::ChecksumMismatch);
                }
            }
        }

        if self.size > self.capacity {
            return Err(StackError::SizeExceedsCapacity);
        }
        Ok(())
    }
}
