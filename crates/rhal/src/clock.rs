//! Millisecond system time.
//!
//! The kernel only ever asks "what time is it now"; all timeouts are
//! computed by the caller from two readings. Wrapping arithmetic on the
//! `u32` value keeps the math correct across the ~49 day rollover.

use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// A monotonic millisecond clock.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary origin. Monotonic, wraps at `u32::MAX`.
    fn now_ms(&self) -> u32;
}

// ── Simulated clock ─────────────────────────────────────────────

/// A manually driven clock for deterministic tests.
///
/// Time only moves when `advance` is called, or (with a non-zero auto
/// step) by a fixed amount per reading, so busy-wait loops that poll the
/// clock are guaranteed to reach their timeout.
pub struct SimClock {
    now: AtomicU32,
    auto_step: AtomicU32,
}

impl SimClock {
    pub const fn new() -> Self {
        Self {
            now: AtomicU32::new(0),
            auto_step: AtomicU32::new(0),
        }
    }

    /// Move time forward by `ms` milliseconds.
    pub fn advance(&self, ms: u32) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    /// Make every `now_ms` reading advance time by `ms` afterwards.
    pub fn set_auto_step(&self, ms: u32) {
        self.auto_step.store(ms, Ordering::Relaxed);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        // Post-increment: the reading reflects time before the step.
        let step = self.auto_step.load(Ordering::Relaxed);
        self.now.fetch_add(step, Ordering::Relaxed)
    }
}

// ── Wall clock ──────────────────────────────────────────────────

/// Real elapsed time since construction. Used by the demo binary.
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}
