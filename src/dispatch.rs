//! Dispatch queue: the trampoline that fires settled Blocks.
//!
//! Settling a tied Block never calls its successor directly. The Block is
//! appended to a thread-local FIFO instead, and the current host is asked
//! (through the scheduler adapter) to run [`drain`] later. A drain fires
//! entries in order; anything enqueued while firing lands in the next pass
//! of the same drain, never in the batch being iterated. That keeps stack
//! depth constant however long a pipe chain gets.

use crate::error::Error;
use crate::runtime;
use crate::tracing_compat::trace;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// A queue entry: a settled Block ready to hand its outcome to its successor.
pub(crate) trait Fire {
    fn fire(self: Rc<Self>);
}

#[derive(Default)]
struct Dispatcher {
    pending: RefCell<VecDeque<Rc<dyn Fire>>>,
    /// A drain is running on this thread.
    firing: Cell<bool>,
    /// A drain was handed to a host and has not started yet.
    scheduled: Cell<bool>,
}

thread_local! {
    static DISPATCHER: Dispatcher = Dispatcher::default();
}

/// Appends `entry` and requests a drain if none is running or scheduled.
pub(crate) fn enqueue(entry: Rc<dyn Fire>) {
    let request = DISPATCHER.with(|d| {
        d.pending.borrow_mut().push_back(entry);
        !d.firing.get() && !d.scheduled.get()
    });
    if request {
        request_drain();
    }
}

/// Called when a host becomes current: picks up work queued without one.
///
/// A drain handed to a previous host may never run, so the scheduled flag
/// is reset here.
pub(crate) fn host_entered() {
    let request = DISPATCHER
        .try_with(|d| {
            d.scheduled.set(false);
            !d.firing.get() && !d.pending.borrow().is_empty()
        })
        .unwrap_or(false);
    if request {
        request_drain();
    }
}

fn request_drain() {
    let scheduled = runtime::schedule(Box::new(drain));
    if scheduled {
        DISPATCHER.with(|d| d.scheduled.set(true));
    } else {
        trace!("no host entered; drain deferred");
    }
}

struct FiringReset;

impl Drop for FiringReset {
    fn drop(&mut self) {
        let _ = DISPATCHER.try_with(|d| d.firing.set(false));
    }
}

/// Fires every queued entry, including ones enqueued while firing.
///
/// A nested call while a drain is running returns immediately.
pub fn drain() {
    let start = DISPATCHER.with(|d| {
        d.scheduled.set(false);
        if d.firing.get() {
            false
        } else {
            d.firing.set(true);
            true
        }
    });
    if !start {
        return;
    }
    let _reset = FiringReset;

    loop {
        let batch = DISPATCHER.with(|d| std::mem::take(&mut *d.pending.borrow_mut()));
        if batch.is_empty() {
            break;
        }
        trace!(len = batch.len(), "drain pass");
        for entry in batch {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| entry.fire())) {
                runtime::report_unhandled(Error::panicked(payload));
            }
        }
    }
}

/// Number of entries waiting to fire on this thread.
#[must_use]
pub fn pending() -> usize {
    DISPATCHER.with(|d| d.pending.borrow().len())
}
