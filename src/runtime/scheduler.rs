//! Scheduler adapter: how the dispatch queue asks a host for a drain.
//!
//! Preference order is immediate, then microtask, then a zero-delay timer.
//! The choice is made once when a host is entered.

use super::{Capabilities, Host, Task};
use std::time::Duration;

/// The host primitive used to request a drain of the dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerKind {
    /// `Host::set_immediate`.
    Immediate,
    /// `Host::queue_microtask`.
    Microtask,
    /// `Host::set_timeout` with zero delay.
    Timer,
}

/// Picks the best available primitive.
#[must_use]
pub const fn select(caps: Capabilities) -> SchedulerKind {
    if caps.immediate {
        SchedulerKind::Immediate
    } else if caps.microtask {
        SchedulerKind::Microtask
    } else {
        SchedulerKind::Timer
    }
}

impl SchedulerKind {
    pub(crate) fn schedule(self, host: &dyn Host, task: Task) {
        match self {
            Self::Immediate => host.set_immediate(task),
            Self::Microtask => host.queue_microtask(task),
            Self::Timer => {
                let _ = host.set_timeout(Duration::ZERO, task);
            }
        }
    }
}
