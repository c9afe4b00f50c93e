//! Join combinator: wait for every input.
//!
//! `all` succeeds with the inputs' values in input order once every input
//! succeeded. The first failure wins: it is delivered at once and every
//! input still pending is aborted.

use crate::block::{success, Block, ErrorTrap, IntoBlock};
use crate::error::Error;
use crate::tracing_compat::debug;
use std::cell::RefCell;
use std::rc::Rc;

struct Join<T: 'static> {
    members: Vec<Block<T>>,
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Waits for all `blocks`.
///
/// An empty input succeeds with an empty vector.
///
/// ```
/// use abb::{all, success, LabLoop};
///
/// let lab = LabLoop::new();
/// let _guard = lab.enter();
/// let joined = all(vec![success(1), success(2)]);
/// lab.run_until_idle();
/// assert_eq!(joined.state(), abb::BlockState::Success);
/// ```
pub fn all<T, I>(blocks: I) -> Block<Vec<T>>
where
    T: 'static,
    I: IntoIterator,
    I::Item: IntoBlock<T>,
{
    let members: Vec<Block<T>> = blocks.into_iter().map(IntoBlock::into_block).collect();
    if members.is_empty() {
        return success(Vec::new());
    }

    let count = members.len();
    let result = Block::<Vec<T>>::running();
    let state = Rc::new(RefCell::new(Join {
        members: members.iter().map(Block::share).collect(),
        values: std::iter::repeat_with(|| None).take(count).collect(),
        remaining: count,
    }));

    let abort_state = Rc::clone(&state);
    result.set_abort_action(move |trap: &mut ErrorTrap| {
        let members = std::mem::take(&mut abort_state.borrow_mut().members);
        for member in &members {
            member.abort_in(trap);
        }
    });

    for (index, member) in members.into_iter().enumerate() {
        let (ok_state, err_state) = (Rc::clone(&state), Rc::clone(&state));
        let (ok_result, err_result) = (result.share(), result.share());
        let tied = member.tie(
            move |value| member_succeeded(&ok_state, &ok_result, index, value),
            move |err| member_failed(&err_state, &err_result, index, err),
        );
        if let Err(err) = tied {
            member_failed(&state, &result, index, err);
            break;
        }
    }
    result
}

fn member_succeeded<T: 'static>(
    state: &Rc<RefCell<Join<T>>>,
    result: &Block<Vec<T>>,
    index: usize,
    value: T,
) {
    let complete = {
        let mut join = state.borrow_mut();
        join.values[index] = Some(value);
        join.remaining -= 1;
        if join.remaining == 0 {
            join.members.clear();
            let values: Option<Vec<T>> = join.values.drain(..).collect();
            Some(values)
        } else {
            None
        }
    };
    match complete {
        Some(Some(values)) => result.settle(Ok(values)),
        Some(None) => result.settle(Err(Error::internal("join completed with a missing value"))),
        None => {}
    }
}

#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
fn member_failed<T: 'static>(
    state: &Rc<RefCell<Join<T>>>,
    result: &Block<Vec<T>>,
    index: usize,
    err: Error,
) {
    let others = std::mem::take(&mut state.borrow_mut().members);
    if others.is_empty() {
        // Already complete, failed or aborted.
        return;
    }
    debug!(member = index, error = %err, "all: failing fast");
    result.settle(Err(err));
    abort_all(&others);
}

/// Aborts every block in `blocks` outside any public abort.
pub(crate) fn abort_all<T: 'static>(blocks: &[Block<T>]) {
    let mut trap = ErrorTrap::unarmed();
    for block in blocks {
        block.abort_in(&mut trap);
    }
}
