//! Weak abort handles.

use super::{abort_cell, ErrorTrap, Inner};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockId, BlockState};
use core::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Type-erased view of a Block used by [`AbortHandle`].
trait Abortable {
    fn is_tied(&self) -> bool;
    fn state(&self) -> BlockState;
    fn abort_in(&self, trap: &mut ErrorTrap);
}

impl<T: 'static> Abortable for RefCell<Inner<T>> {
    fn is_tied(&self) -> bool {
        self.borrow().tied
    }

    fn state(&self) -> BlockState {
        self.borrow().state()
    }

    fn abort_in(&self, trap: &mut ErrorTrap) {
        abort_cell(self, trap);
    }
}

/// A cloneable handle that can abort a Block after it was moved into a
/// combinator.
///
/// The handle does not keep the Block alive. Aborting through it is refused
/// once something was piped onto the Block, because cancellation then
/// belongs to the pipe's result.
#[derive(Clone)]
pub struct AbortHandle {
    id: BlockId,
    target: Weak<dyn Abortable>,
}

impl AbortHandle {
    pub(super) fn new<T: 'static>(inner: &Rc<RefCell<Inner<T>>>) -> Self {
        let id = inner.borrow().id;
        let erased: Rc<dyn Abortable> = Rc::clone(inner) as Rc<dyn Abortable>;
        Self {
            id,
            target: Rc::downgrade(&erased),
        }
    }

    /// Identifier of the target Block.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// State of the target, or `None` once it was dropped.
    #[must_use]
    pub fn state(&self) -> Option<BlockState> {
        self.target.upgrade().map(|t| t.state())
    }

    /// Aborts the target. A dropped target counts as success.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::SuccessorSet`] if a successor was registered, or the
    /// first failure raised while cancelling.
    pub fn abort(&self) -> Result<()> {
        let Some(target) = self.target.upgrade() else {
            return Ok(());
        };
        if target.is_tied() {
            return Err(Error::usage(
                ErrorKind::SuccessorSet,
                "cannot abort a block whose successor is set",
            ));
        }
        let mut trap = ErrorTrap::armed();
        target.abort_in(&mut trap);
        trap.finish()
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
