//! Seedable randomness for nomination jitter, injected via a trait object
//! so tests can deterministically exercise nomination timing instead of
//! depending on the OS RNG.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::Duration;

/// A source of nomination jitter, injected so tests can replace it with a
/// fixed sequence.
pub trait RandomSource {
    /// Returns a value uniformly distributed in `[0, bound)`. `bound` of
    /// zero returns zero.
    fn next_u32_below(&mut self, bound: u32) -> u32;

    /// Convenience used by `CANVASS`'s nomination-deadline jitter: a
    /// duration uniformly distributed in `[0, bound)`.
    fn jitter(&mut self, bound: Duration) -> Duration {
        let bound_ms = bound.as_millis() as u32;
        Duration::from_millis(self.next_u32_below(bound_ms) as u64)
    }
}

/// The production implementation, backed by `rand`'s thread-local RNG
/// generator seeded from the OS.
pub struct ThreadRandomSource {
    rng: StdRng,
}

impl ThreadRandomSource {
    pub fn new() -> Self {
        ThreadRandomSource {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for ThreadRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandomSource {
    fn next_u32_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.next_u32() % bound
    }
}

/// A deterministic source for tests: always returns a fixed value (capped
/// to the requested bound), so scenario tests can assert exact
/// nomination deadlines.
pub struct FixedRandomSource(pub u32);

impl RandomSource for FixedRandomSource {
    fn next_u32_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.0 % bound
        }
    }
}
