//! Race combinators: the first input to settle decides the outcome.

use super::join::abort_all;
use crate::block::{success, Block, ErrorTrap, IntoBlock};
use crate::error::Result;
use crate::tracing_compat::trace;
use std::cell::RefCell;
use std::rc::Rc;

/// Races `blocks`, mapping the winning value with `lift`. Losers are
/// aborted exactly once. `blocks` must not be empty.
pub(crate) fn race<T: 'static, U: 'static>(blocks: Vec<Block<T>>, lift: fn(T) -> U) -> Block<U> {
    let result = Block::<U>::running();
    let members = Rc::new(RefCell::new(blocks.iter().map(Block::share).collect::<Vec<_>>()));

    let abort_members = Rc::clone(&members);
    result.set_abort_action(move |trap: &mut ErrorTrap| {
        let members = std::mem::take(&mut *abort_members.borrow_mut());
        for member in &members {
            member.abort_in(trap);
        }
    });

    for (index, block) in blocks.into_iter().enumerate() {
        let (ok_members, err_members) = (Rc::clone(&members), Rc::clone(&members));
        let (ok_result, err_result) = (result.share(), result.share());
        let tied = block.tie(
            move |value| finish(&ok_members, &ok_result, index, Ok(lift(value))),
            move |err| finish(&err_members, &err_result, index, Err(err)),
        );
        if let Err(err) = tied {
            finish(&members, &result, index, Err(err));
            break;
        }
    }
    result
}

#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
fn finish<T: 'static, U: 'static>(
    members: &Rc<RefCell<Vec<Block<T>>>>,
    result: &Block<U>,
    winner: usize,
    outcome: Result<U>,
) {
    let losers = std::mem::take(&mut *members.borrow_mut());
    if losers.is_empty() {
        return;
    }
    trace!(winner, ok = outcome.is_ok(), "race decided");
    result.settle(outcome);
    abort_all(&losers);
}

/// Settles with whichever of `blocks` settles first.
///
/// An empty input succeeds with `None`. Every other input is aborted once
/// the race is decided.
pub fn any<T, I>(blocks: I) -> Block<Option<T>>
where
    T: 'static,
    I: IntoIterator,
    I::Item: IntoBlock<T>,
{
    let blocks: Vec<Block<T>> = blocks.into_iter().map(IntoBlock::into_block).collect();
    if blocks.is_empty() {
        return success(None);
    }
    race(blocks, Some)
}
