//! Deterministic byte hasher for string keys.
//!
//! Folds every written byte into a 32-bit state with a multiply and an
//! xor-shift. It is fast and stable across runs, and offers no protection
//! against crafted collisions.

use core::hash::{BuildHasher, Hasher};

const SEED: u32 = 3_323_198_485;
const MULTIPLIER: u32 = 0x5bd1_e995;

/// Hasher state; `finish` yields the 32-bit state zero-extended.
#[derive(Clone, Debug)]
pub struct StrHasher {
    state: u32,
}

impl Default for StrHasher {
    fn default() -> Self {
        Self { state: SEED }
    }
}

impl Hasher for StrHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut h = self.state;
        for &b in bytes {
            h ^= u32::from(b);
            h = h.wrapping_mul(MULTIPLIER);
            h ^= h >> 15;
        }
        self.state = h;
    }

    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.state)
    }
}

/// `BuildHasher` producing [`StrHasher`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrBuildHasher;

impl BuildHasher for StrBuildHasher {
    type Hasher = StrHasher;

    fn build_hasher(&self) -> StrHasher {
        StrHasher::default()
    }
}
