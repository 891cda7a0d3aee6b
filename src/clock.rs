//! Time sources for the event loop.
//!
//! The loop consumes an abstract monotonic clock: `now` is read once per
//! turn, and `idle_until` is the loop's only blocking point, used when the
//! ready queue is empty but deadlines are pending. Production code uses
//! [`MonotonicClock`]; tests use [`VirtualClock`], which jumps straight to
//! the requested instant so timer-heavy suites run in microseconds and
//! deterministically.

use crate::types::Time;
use std::cell::Cell;
use std::time::Instant;

/// A monotonic time source consumed by the event loop.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> Time;

    /// Blocks (or advances) until `deadline`.
    ///
    /// Called only when no task is ready and `deadline` is the earliest
    /// pending wake-up.
    fn idle_until(&self, deadline: Time);
}

/// Wall-clock time, anchored at construction.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        let nanos = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Time::from_nanos(nanos)
    }

    fn idle_until(&self, deadline: Time) {
        let now = self.now();
        if now < deadline {
            std::thread::sleep(now.until(deadline));
        }
    }
}

/// A controllable clock for deterministic tests.
///
/// Time only moves when the loop idles (jumping directly to the next
/// deadline) or when a test calls [`advance`](Self::advance). No wall time
/// ever passes.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<Time>,
}

impl VirtualClock {
    /// Creates a virtual clock at `Time::ZERO`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `nanos` nanoseconds.
    pub fn advance(&self, nanos: u64) {
        self.now.set(self.now.get().saturating_add_nanos(nanos));
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Time {
        self.now.get()
    }

    fn idle_until(&self, deadline: Time) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_jumps_forward_only() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Time::ZERO);

        clock.idle_until(Time::from_millis(5));
        assert_eq!(clock.now(), Time::from_millis(5));

        // Idling toward the past is a no-op.
        clock.idle_until(Time::from_millis(1));
        assert_eq!(clock.now(), Time::from_millis(5));
    }

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
