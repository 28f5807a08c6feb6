//! Error taxonomy for guarded stack operations.

use thiserror::Error;

/// Reason a stack operation was refused.
///
/// `Underflow` and `AllocationFailed` are ordinary conditions a caller is
/// expected to branch on. `GuardCorrupted`, `ChecksumMismatch` and
/// `SizeExceedsCapacity` mean the stack is no longer trustworthy and should
/// not be used again; nothing in this crate attempts to repair it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackError {
    /// No stack was supplied, or construction was asked for zero capacity.
    #[error("stack pointer is null")]
    NullStack,
    /// The stack has no allocation (destroyed, or never constructed).
    #[error("stack buffer pointer is null")]
    NullBuffer,
    /// A sentinel in the struct or at the allocation edges changed.
    #[error("canary value changed")]
    GuardCorrupted,
    /// Allocation contents no longer hash to the stored checksum.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// `size > capacity`.
    #[error("size > capacity")]
    SizeExceedsCapacity,
    /// The buffer could not be (re)allocated.
    #[error("memory allocation failed")]
    AllocationFailed,
    /// Pop from an empty stack.
    #[error("boundary exceed")]
    Underflow,
}

impl StackError {
    /// Stable snake_case identifier for structured logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NullStack => "null_stack",
            Self::NullBuffer => "null_buffer",
            Self::GuardCorrupted => "guard_corrupted",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::SizeExceedsCapacity => "size_exceeds_capacity",
            Self::AllocationFailed => "allocation_failed",
            Self::Underflow => "underflow",
        }
    }

    /// True for errors that indicate memory or invariant corruption.
    #[must_use]
    pub const fn is_corruption(self) -> bool {
        matches!(
            self,
            Self::GuardCorrupted | Self::ChecksumMismatch | Self::SizeExceedsCapacity
        )
    }

    /// True for conditions the caller can recover from and keep using the stack.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::Underflow | Self::AllocationFailed)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StackError>;

/// Human-readable text for an operation outcome; `"none"` for success.
#[must_use]
pub fn describe<T>(result: &Result<T>) -> String {
    match result {
        Ok(_) => "none".to_string(),
        Err(err) => err.to_string(),
    }
}
