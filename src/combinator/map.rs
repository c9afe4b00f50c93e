//! Element-wise mapping over a `Block<Vec<T>>` with bounded concurrency.

use crate::block::{run_cont, success, Block, ErrorTrap, IntoBlock};
use crate::error::Error;
use crate::tracing_compat::debug;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

struct MapState<T, U: 'static, F> {
    queue: VecDeque<(usize, T)>,
    func: Option<F>,
    in_flight: BTreeMap<usize, Block<U>>,
    values: Vec<Option<U>>,
    remaining: usize,
    limit: usize,
    stopped: bool,
}

type Shared<T, U, F> = Rc<RefCell<MapState<T, U, F>>>;

impl<T: 'static> Block<Vec<T>> {
    /// Applies `func` to every element, all elements in flight at once.
    pub fn map<U, F, R>(self, func: F) -> Block<Vec<U>>
    where
        U: 'static,
        F: FnMut(T) -> R + 'static,
        R: IntoBlock<U>,
    {
        self.map_limit(usize::MAX, func)
    }

    /// Applies `func` to every element with at most `limit` elements in
    /// flight. A limit of `0` is treated as `1`.
    ///
    /// Results keep input order. The first element failure aborts every
    /// element still in flight and fails the result.
    pub fn map_limit<U, F, R>(self, limit: usize, func: F) -> Block<Vec<U>>
    where
        U: 'static,
        F: FnMut(T) -> R + 'static,
        R: IntoBlock<U>,
    {
        let limit = limit.max(1);
        self.then(move |items: Vec<T>| map_items(items, limit, func))
    }
}

fn map_items<T, U, F, R>(items: Vec<T>, limit: usize, func: F) -> Block<Vec<U>>
where
    T: 'static,
    U: 'static,
    F: FnMut(T) -> R + 'static,
    R: IntoBlock<U>,
{
    if items.is_empty() {
        return success(Vec::new());
    }
    let count = items.len();
    let result = Block::<Vec<U>>::running();
    let state: Shared<T, U, F> = Rc::new(RefCell::new(MapState {
        queue: items.into_iter().enumerate().collect(),
        func: Some(func),
        in_flight: BTreeMap::new(),
        values: std::iter::repeat_with(|| None).take(count).collect(),
        remaining: count,
        limit,
        stopped: false,
    }));

    let abort_state = Rc::clone(&state);
    result.set_abort_action(move |trap: &mut ErrorTrap| {
        let in_flight = stop(&abort_state);
        for block in in_flight.values() {
            block.abort_in(trap);
        }
    });

    pump(&state, &result);
    result
}

/// Stops starting elements and hands back the ones in flight.
fn stop<T, U: 'static, F>(state: &Shared<T, U, F>) -> BTreeMap<usize, Block<U>> {
    let mut map = state.borrow_mut();
    map.stopped = true;
    map.queue.clear();
    map.func = None;
    std::mem::take(&mut map.in_flight)
}

fn pump<T, U, F, R>(state: &Shared<T, U, F>, result: &Block<Vec<U>>)
where
    T: 'static,
    U: 'static,
    F: FnMut(T) -> R + 'static,
    R: IntoBlock<U>,
{
    loop {
        let (index, item, mut func) = {
            let mut map = state.borrow_mut();
            if map.stopped || map.in_flight.len() >= map.limit {
                return;
            }
            let Some((index, item)) = map.queue.pop_front() else {
                return;
            };
            let Some(func) = map.func.take() else {
                return;
            };
            (index, item, func)
        };

        let element: Block<U> = run_cont(&mut func, item);

        {
            let mut map = state.borrow_mut();
            if map.stopped {
                drop(map);
                drop(func);
                element.abort_in(&mut ErrorTrap::unarmed());
                return;
            }
            map.func = Some(func);
            map.in_flight.insert(index, element.share());
        }

        let (ok_state, err_state) = (Rc::clone(state), Rc::clone(state));
        let (ok_result, err_result) = (result.share(), result.share());
        let tied = element.tie(
            move |value| element_succeeded(&ok_state, &ok_result, index, value),
            move |err| element_failed(&err_state, &err_result, index, err),
        );
        if let Err(err) = tied {
            element_failed(state, result, index, err);
            return;
        }
    }
}

fn element_succeeded<T, U, F, R>(
    state: &Shared<T, U, F>,
    result: &Block<Vec<U>>,
    index: usize,
    value: U,
) where
    T: 'static,
    U: 'static,
    F: FnMut(T) -> R + 'static,
    R: IntoBlock<U>,
{
    let finished = {
        let mut map = state.borrow_mut();
        if map.stopped || map.in_flight.remove(&index).is_none() {
            return;
        }
        map.values[index] = Some(value);
        map.remaining -= 1;
        if map.remaining == 0 {
            map.stopped = true;
            map.func = None;
            Some(map.values.drain(..).collect::<Option<Vec<U>>>())
        } else {
            None
        }
    };
    match finished {
        Some(Some(values)) => result.settle(Ok(values)),
        Some(None) => result.settle(Err(Error::internal("map completed with a missing value"))),
        None => pump(state, result),
    }
}

fn element_failed<T, U, F>(
    state: &Shared<T, U, F>,
    result: &Block<Vec<U>>,
    index: usize,
    err: Error,
) where
    U: 'static,
{
    if state.borrow().stopped {
        return;
    }
    let in_flight = stop(state);
    debug!(element = index, in_flight = in_flight.len(), error = %err, "map: failing fast");
    result.settle(Err(err));
    let mut trap = ErrorTrap::unarmed();
    for (other, block) in &in_flight {
        if *other != index {
            block.abort_in(&mut trap);
        }
    }
}
