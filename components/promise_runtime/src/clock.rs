//! Time sources for the event loop.
//!
//! The loop never polls: when nothing is runnable it asks the clock to wait
//! until the next timer deadline. [`SystemClock`] sleeps; [`VirtualClock`]
//! jumps straight to the deadline, which makes timer-driven behaviour
//! deterministic under test.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// A monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds elapsed since the clock's origin.
    fn now_ms(&self) -> u64;

    /// Blocks (or jumps) until `now_ms() >= deadline_ms`.
    fn wait_until(&self, deadline_ms: u64);
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn wait_until(&self, deadline_ms: u64) {
        let now = self.now_ms();
        if deadline_ms > now {
            std::thread::sleep(Duration::from_millis(deadline_ms - now));
        }
    }
}

/// A deterministic clock for tests and simulations.
///
/// ```
/// use promise_runtime::{Clock, VirtualClock};
///
/// let clock = VirtualClock::new(0);
/// clock.wait_until(150);
/// assert_eq!(clock.now_ms(), 150);
/// clock.advance(50);
/// assert_eq!(clock.now_ms(), 200);
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    current_ms: Cell<u64>,
}

impl VirtualClock {
    /// Creates a virtual clock starting at the given time.
    pub const fn new(start_ms: u64) -> Self {
        Self {
            current_ms: Cell::new(start_ms),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, ms: u64) {
        self.current_ms.set(self.current_ms.get().saturating_add(ms));
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.get()
    }

    fn wait_until(&self, deadline_ms: u64) {
        if deadline_ms > self.current_ms.get() {
            self.current_ms.set(deadline_ms);
        }
    }
}
