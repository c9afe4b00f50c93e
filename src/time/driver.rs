//! Clock implementations.

use crate::types::Time;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of the current time for an event loop.
pub trait TimeSource {
    /// Returns the current time.
    fn now(&self) -> Time;

    /// Returns true if waiting for a deadline should block the thread.
    ///
    /// Virtual clocks return false: their loops jump straight to the deadline
    /// only when told to advance.
    fn is_real(&self) -> bool {
        true
    }
}

/// Wall clock time source. The epoch is the instant the clock was created.
#[derive(Debug)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    /// Creates a wall clock starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Time {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Time::from_nanos(nanos)
    }
}

/// Virtual time source for lab testing.
///
/// Time only moves forward, and only when explicitly advanced.
///
/// ```
/// use abb::time::{TimeSource, VirtualClock};
/// use abb::types::Time;
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Time::ZERO);
///
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(clock.now(), Time::from_millis(100));
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<Time>,
}

impl VirtualClock {
    /// Creates a virtual clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub fn starting_at(time: Time) -> Self {
        Self {
            now: Cell::new(time),
        }
    }

    /// Advances time by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Advances time to `time`. Targets in the past are ignored.
    pub fn advance_to(&self, time: Time) {
        if time > self.now.get() {
            self.now.set(time);
        }
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Time {
        self.now.get()
    }

    fn is_real(&self) -> bool {
        false
    }
}
