//! Content checksums over the backing allocation.
//!
//! Elements are fed to the hash as little-endian 4-byte groups, guard slots
//! included, so a checksum covers every byte the stack owns.

use crate::config::ChecksumKind;
use crate::stack::Element;

/// DJB2 rolling hash: `h = 0; for b in bytes { h = h * 33 + b }` with wraparound.
#[must_use]
pub fn djb2(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |h, &b| djb2_step(h, b))
}

#[inline(always)]
fn djb2_step(h: u64, b: u8) -> u64 {
    (h << 5).wrapping_add(h).wrapping_add(u64::from(b))
}

/// First eight bytes of the BLAKE3 digest of `bytes`, little-endian.
#[must_use]
pub fn blake3_u64(bytes: &[u8]) -> u64 {
    fold_blake3(&blake3::hash(bytes))
}

fn fold_blake3(digest: &blake3::Hash) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

impl ChecksumKind {
    /// Hash a byte buffer with this algorithm.
    #[must_use]
    pub fn digest(self, bytes: &[u8]) -> u64 {
        match self {
            Self::Djb2 => djb2(bytes),
            Self::Blake3 => blake3_u64(bytes),
        }
    }

    /// Hash a slot buffer without materializing its byte image.
    #[must_use]
    pub fn digest_slots(self, slots: &[Element]) -> u64 {
        match self {
            Self::Djb2 => slots
                .iter()
                .flat_map(|slot| slot.to_le_bytes())
                .fold(0u64, djb2_step),
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for slot in slots {
                    hasher.update(&slot.to_le_bytes());
                }
                fold_blake3(&hasher.finalize())
            }
        }
    }
}
