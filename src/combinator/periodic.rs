//! Periodic invocation on a host interval.

use crate::block::{run_cont, Block, ErrorTrap, IntoBlock};
use crate::error::Error;
use crate::runtime::{self, HostTimer};
use crate::tracing_compat::{debug, trace};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

struct Periodic<F, V: 'static> {
    func: Option<F>,
    current: Option<Block<V>>,
    timer: Option<HostTimer>,
    ticks: u64,
    stopped: bool,
}

type Shared<F, V> = Rc<RefCell<Periodic<F, V>>>;

/// Invokes `func` every `delay`, never overlapping invocations.
///
/// A tick is skipped while the Block returned by the previous invocation
/// has not settled. The returned Block never succeeds: the first failure
/// clears the interval and fails it, and aborting it clears the interval
/// and aborts the invocation in flight.
///
/// Fails with [`ErrorKind::HostUnavailable`](crate::error::ErrorKind::HostUnavailable)
/// if no host is entered.
pub fn periodic<F, R, V>(func: F, delay: Duration) -> Block<()>
where
    F: FnMut() -> R + 'static,
    R: IntoBlock<V>,
    V: 'static,
{
    let result = Block::<()>::running();
    let state: Shared<F, V> = Rc::new(RefCell::new(Periodic {
        func: Some(func),
        current: None,
        timer: None,
        ticks: 0,
        stopped: false,
    }));

    let (tick_state, tick_result) = (Rc::clone(&state), result.share());
    let timer = match runtime::set_interval(
        delay,
        Box::new(move || tick(&tick_state, &tick_result)),
    ) {
        Ok(timer) => timer,
        Err(err) => return Block::settled(Err(err)),
    };
    state.borrow_mut().timer = Some(timer);

    let abort_state = Rc::clone(&state);
    result.set_abort_action(move |trap: &mut ErrorTrap| {
        if let Some(current) = shut_down(&abort_state) {
            current.abort_in(trap);
        }
    });
    result
}

/// Stops future ticks, returning the invocation in flight.
fn shut_down<F, V: 'static>(state: &Shared<F, V>) -> Option<Block<V>> {
    let (timer, current, func) = {
        let mut periodic = state.borrow_mut();
        periodic.stopped = true;
        (
            periodic.timer.take(),
            periodic.current.take(),
            periodic.func.take(),
        )
    };
    drop(func);
    if let Some(timer) = timer {
        timer.clear();
    }
    current
}

#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
fn tick<F, R, V>(state: &Shared<F, V>, result: &Block<()>)
where
    F: FnMut() -> R + 'static,
    R: IntoBlock<V>,
    V: 'static,
{
    let (tick, mut func) = {
        let mut periodic = state.borrow_mut();
        if periodic.stopped {
            return;
        }
        periodic.ticks += 1;
        if periodic.current.is_some() {
            debug!(tick = periodic.ticks, "periodic: previous invocation running, tick skipped");
            return;
        }
        let Some(func) = periodic.func.take() else {
            return;
        };
        (periodic.ticks, func)
    };
    trace!(tick, "periodic: invoking");

    let block: Block<V> = run_cont(|()| func(), ());
    {
        let mut periodic = state.borrow_mut();
        if periodic.stopped {
            drop(periodic);
            drop(func);
            block.abort_in(&mut ErrorTrap::unarmed());
            return;
        }
        periodic.func = Some(func);
        periodic.current = Some(block.share());
    }

    let ok_state = Rc::clone(state);
    let (err_state, err_result) = (Rc::clone(state), result.share());
    let tied = block.tie(
        move |_| ok_state.borrow_mut().current = None,
        move |err| invocation_failed(&err_state, &err_result, err),
    );
    if let Err(err) = tied {
        invocation_failed(state, result, err);
    }
}

fn invocation_failed<F, V: 'static>(state: &Shared<F, V>, result: &Block<()>, err: Error) {
    debug!(error = %err, "periodic: invocation failed, interval cleared");
    let finished = shut_down(state);
    drop(finished);
    result.settle(Err(err));
}
