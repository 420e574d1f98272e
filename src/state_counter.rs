//! The published "Election State" counter: a single 32-bit slot updated
//! with the current state code on every transition. This is the stable
//! contract an external monitor depends on; `log` output (see
//! `election.rs`) is strictly additional.

use std::sync::atomic::{AtomicU32, Ordering};

pub trait StateCounter {
    fn set(&mut self, code: u32);
    fn get(&self) -> u32;
}

/// An in-process implementation suitable for tests and for embedding in a
/// process that exposes it to monitoring some other way (e.g. mapping the
/// same `AtomicU32` into a memory-mapped counters file).
#[derive(Debug, Default)]
pub struct AtomicStateCounter(AtomicU32);

impl AtomicStateCounter {
    pub fn new() -> Self {
        AtomicStateCounter(AtomicU32::new(0))
    }
}

impl StateCounter for AtomicStateCounter {
    fn set(&mut self, code: u32) {
        self.0.store(code, Ordering::Release);
    }

    fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}
