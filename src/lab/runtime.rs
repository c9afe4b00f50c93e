//! The lab loop: an [`EventLoop`] driven by a [`VirtualClock`].

use crate::error::Error;
use crate::runtime::{EnterGuard, EventLoop, LoopConfig};
use crate::time::VirtualClock;
use crate::tracing_compat::trace;
use crate::types::Time;
use core::fmt;
use std::time::Duration;

/// Event loop with virtual time.
///
/// ```
/// use abb::{wait, LabLoop};
/// use std::time::Duration;
///
/// let lab = LabLoop::new();
/// let _guard = lab.enter();
/// let done = wait(Duration::from_secs(3600));
/// lab.advance(Duration::from_secs(3600));
/// assert_eq!(done.state(), abb::BlockState::Success);
/// ```
pub struct LabLoop {
    inner: EventLoop<VirtualClock>,
}

impl LabLoop {
    /// Creates a lab loop at time zero that records unhandled failures.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates a lab loop with the given configuration.
    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            inner: EventLoop::with_clock(VirtualClock::new(), config),
        }
    }

    /// Installs this loop as the current host of the thread.
    pub fn enter(&self) -> EnterGuard {
        self.inner.enter()
    }

    /// Runs ready work until none is left, without moving time.
    ///
    /// Returns the number of callbacks run.
    pub fn run_until_idle(&self) -> usize {
        self.inner.run_until_idle()
    }

    /// Moves time forward by `delta`, firing every timer due on the way in
    /// deadline order and running ready work after each one.
    pub fn advance(&self, delta: Duration) {
        let target = self.now() + delta;
        self.run_until_idle();
        while let Some(deadline) = self.inner.next_deadline() {
            if deadline > target {
                break;
            }
            self.inner.clock().advance_to(deadline);
            self.run_until_idle();
        }
        self.inner.clock().advance_to(target);
        self.run_until_idle();
        trace!(now = %self.now(), "lab advanced");
    }

    /// Jumps to the earliest live timer deadline and runs everything due.
    ///
    /// Returns false if no timer is pending.
    pub fn advance_to_next(&self) -> bool {
        self.run_until_idle();
        let Some(deadline) = self.inner.next_deadline() else {
            return false;
        };
        self.inner.clock().advance_to(deadline);
        self.run_until_idle();
        true
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.inner.now()
    }

    /// Number of live timeouts and intervals.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.pending_timers()
    }

    /// Deadline of the earliest live timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.inner.next_deadline()
    }

    /// Returns true if nothing is queued and no timer is live.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        !self.inner.has_ready_work()
            && self.inner.pending_timers() == 0
            && crate::dispatch::pending() == 0
    }

    /// Drains the recorded unhandled failures.
    pub fn take_unhandled(&self) -> Vec<Error> {
        self.inner.take_unhandled()
    }

    /// The loop's configuration.
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        self.inner.config()
    }
}

impl Default for LabLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LabLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LabLoop").field(&self.inner).finish()
    }
}
