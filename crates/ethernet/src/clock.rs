//! Millisecond time source for timestamps and trust-window checks.

use std::sync::atomic::{AtomicU64, Ordering};

use auto_impl::auto_impl;
use web_time::Instant;

/// Monotonic milliseconds since an arbitrary origin.
#[auto_impl(&, Arc, Box)]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Offset by one so a timestamp taken at the origin is non-zero
        u64::try_from(self.origin.elapsed().as_millis())
            .unwrap_or(u64::MAX)
            .saturating_add(1)
    }
}

/// Manually advanced clock for deterministic timing.
#[derive(Debug)]
pub struct MockClock(AtomicU64);

impl Default for MockClock {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl MockClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
