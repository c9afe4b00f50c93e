//! The Block: a single-fire, cancellable asynchronous result cell.
//!
//! A Block starts `Running`, settles once with a value or a failure, and
//! hands that outcome to at most one successor. Delivery always goes through
//! the dispatch queue, so a successor never runs inside the call that
//! settled the Block.
//!
//! # Cancellation ownership
//!
//! Until something is piped onto a Block, whoever holds it may abort it.
//! Piping moves the Block into the pipe, and from then on cancellation flows
//! through the pipe's result: aborting the result aborts the source. An
//! [`AbortHandle`] taken before the pipe therefore fails with
//! [`ErrorKind::SuccessorSet`](crate::error::ErrorKind::SuccessorSet).
//!
//! # Unhandled failures
//!
//! A Block that settles with a failure and is dropped without ever being
//! tied reports the failure to the host's unhandled-error channel.

mod construct;
mod handle;
mod trap;

pub use construct::{
    error, from_block, from_result, from_thenable, implement, success, wrap, Cancel, IntoBlock,
    IntoCancel, Resolver, Thenable,
};
pub use handle::AbortHandle;
pub use trap::ErrorTrap;

pub(crate) use construct::{abort_cleanup, run_cont};

use crate::dispatch::{self, Fire};
use crate::error::{Error, ErrorKind, Result};
use crate::runtime;
use crate::tracing_compat::trace;
use crate::types::{BlockId, BlockState};
use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) type AbortAction = Box<dyn FnOnce(&mut ErrorTrap)>;

enum Phase<T> {
    Running,
    Settled(Result<T>),
    Fired { ok: bool },
    Aborted,
}

struct Successor<T> {
    on_success: Box<dyn FnOnce(T)>,
    on_error: Box<dyn FnOnce(Error)>,
}

pub(crate) struct Inner<T> {
    id: BlockId,
    phase: Phase<T>,
    successor: Option<Successor<T>>,
    tied: bool,
    abort_action: Option<AbortAction>,
}

impl<T> Inner<T> {
    fn new(phase: Phase<T>) -> Self {
        Self {
            id: BlockId::next(),
            phase,
            successor: None,
            tied: false,
            abort_action: None,
        }
    }

    fn state(&self) -> BlockState {
        match &self.phase {
            Phase::Running => BlockState::Running,
            Phase::Settled(Ok(_)) | Phase::Fired { ok: true } => BlockState::Success,
            Phase::Settled(Err(_)) | Phase::Fired { ok: false } => BlockState::Error,
            Phase::Aborted => BlockState::Aborted,
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if self.tied {
            return;
        }
        if let Phase::Settled(Err(err)) = std::mem::replace(&mut self.phase, Phase::Aborted) {
            trace!(block = %self.id, "dropped with unconsumed failure");
            runtime::report_unhandled(err);
        }
    }
}

impl<T: 'static> Fire for RefCell<Inner<T>> {
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    fn fire(self: Rc<Self>) {
        let (id, successor, outcome) = {
            let mut inner = self.borrow_mut();
            let Some(successor) = inner.successor.take() else {
                return;
            };
            match std::mem::replace(&mut inner.phase, Phase::Aborted) {
                Phase::Settled(outcome) => {
                    inner.phase = Phase::Fired {
                        ok: outcome.is_ok(),
                    };
                    (inner.id, successor, outcome)
                }
                other => {
                    inner.phase = other;
                    inner.successor = Some(successor);
                    return;
                }
            }
        };
        trace!(block = %id, ok = outcome.is_ok(), "fire");
        match outcome {
            Ok(value) => (successor.on_success)(value),
            Err(err) => (successor.on_error)(err),
        }
    }
}

/// Aborts the Block in `cell`, running its abort action if it was still
/// running.
fn abort_cell<T>(cell: &RefCell<Inner<T>>, trap: &mut ErrorTrap) {
    let (action, successor, previous) = {
        let mut inner = cell.borrow_mut();
        if matches!(inner.phase, Phase::Aborted) {
            return;
        }
        trace!(block = %inner.id, "abort");
        let previous = std::mem::replace(&mut inner.phase, Phase::Aborted);
        (inner.abort_action.take(), inner.successor.take(), previous)
    };
    drop(successor);
    drop(previous);
    if let Some(action) = action {
        action(trap);
    }
}

/// A cancellable asynchronous computation producing a `T` or an [`Error`].
///
/// Blocks are single-threaded (`!Send`) and are consumed by the combinators
/// that compose them.
pub struct Block<T: 'static> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: 'static> Block<T> {
    fn from_phase(phase: Phase<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(phase))),
        }
    }

    /// A Block still waiting for its outcome.
    pub(crate) fn running() -> Self {
        Self::from_phase(Phase::Running)
    }

    /// A Block created with its outcome already delivered.
    pub(crate) fn settled(outcome: Result<T>) -> Self {
        Self::from_phase(Phase::Settled(outcome))
    }

    /// An inert, already aborted Block.
    pub(crate) fn aborted() -> Self {
        Self::from_phase(Phase::Aborted)
    }

    /// A second owner of the same Block.
    pub(crate) fn share(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Unique identifier, for diagnostics.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.inner.borrow().id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BlockState {
        self.inner.borrow().state()
    }

    /// Returns true if the Block was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self.inner.borrow().phase, Phase::Aborted)
    }

    /// A weak handle that can abort this Block later.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(&self.inner)
    }

    /// Cancels the Block and everything it is waiting on.
    ///
    /// Aborting a running Block runs its cancel action exactly once; aborting
    /// a settled or aborted Block only marks it aborted. The first failure
    /// raised by any cancel action in the cascade is returned.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::SuccessorSet`] if a successor was registered on this
    /// Block, or the first failure raised while cancelling.
    pub fn abort(&self) -> Result<()> {
        if self.inner.borrow().tied {
            return Err(Error::usage(
                ErrorKind::SuccessorSet,
                "cannot abort a block whose successor is set",
            ));
        }
        let mut trap = ErrorTrap::armed();
        self.abort_in(&mut trap);
        trap.finish()
    }

    /// Delivers the outcome. No-op unless the Block is running.
    pub(crate) fn settle(&self, outcome: Result<T>) {
        let (action, enqueue, rejected) = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.phase, Phase::Running) {
                (None, false, Some(outcome))
            } else {
                trace!(block = %inner.id, ok = outcome.is_ok(), "settle");
                inner.phase = Phase::Settled(outcome);
                (inner.abort_action.take(), inner.successor.is_some(), None)
            }
        };
        drop(rejected);
        drop(action);
        if enqueue {
            dispatch::enqueue(Rc::clone(&self.inner) as Rc<dyn Fire>);
        }
    }

    /// Registers the successor pair. Enqueues at once if already settled.
    pub(crate) fn tie(
        &self,
        on_success: impl FnOnce(T) + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        let enqueue = {
            let mut inner = self.inner.borrow_mut();
            if inner.tied {
                return Err(Error::usage(
                    ErrorKind::AlreadyTied,
                    "a successor is already registered",
                ));
            }
            if matches!(inner.phase, Phase::Aborted) {
                return Err(Error::usage(
                    ErrorKind::AlreadyAborted,
                    "cannot tie an aborted block",
                ));
            }
            trace!(block = %inner.id, "tie");
            inner.tied = true;
            inner.successor = Some(Successor {
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            });
            matches!(inner.phase, Phase::Settled(_))
        };
        if enqueue {
            dispatch::enqueue(Rc::clone(&self.inner) as Rc<dyn Fire>);
        }
        Ok(())
    }

    /// Aborts as part of a cascade, recording cancel failures in `trap`.
    pub(crate) fn abort_in(&self, trap: &mut ErrorTrap) {
        abort_cell(&self.inner, trap);
    }

    /// Installs the cancel action. Ignored unless the Block is running.
    pub(crate) fn set_abort_action(&self, action: impl FnOnce(&mut ErrorTrap) + 'static) {
        let mut inner = self.inner.borrow_mut();
        if matches!(inner.phase, Phase::Running) {
            inner.abort_action = Some(Box::new(action));
        }
    }

    /// Takes a delivered failure out of an untied Block, marking it aborted.
    pub(crate) fn take_failure(&self) -> Option<Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.tied || !matches!(inner.phase, Phase::Settled(Err(_))) {
            return None;
        }
        match std::mem::replace(&mut inner.phase, Phase::Aborted) {
            Phase::Settled(Err(err)) => Some(err),
            _ => None,
        }
    }
}

impl<T: 'static> fmt::Debug for Block<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Block")
            .field("id", &inner.id)
            .field("state", &inner.state())
            .field("tied", &inner.tied)
            .finish()
    }
}
