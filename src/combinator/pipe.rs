//! Sequencing: `pipe` and the combinators built directly on it.
//!
//! A pipe consumes its source Block and returns a new result Block. When the
//! source fires, exactly one handler runs. A handler either maps the outcome
//! synchronously (`Step::Forward`) or derives a continuation Block whose
//! outcome becomes the result (`Step::Derive`).
//!
//! Aborting the result before the source settled aborts the source and runs
//! the optional abort hook. Once a continuation was derived, aborting the
//! result aborts the continuation instead.

use crate::block::{abort_cleanup, run_cont, AbortAction, Block, ErrorTrap, IntoBlock};
use crate::error::{Error, Result};
use crate::tracing_compat::warn;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// One side of a pipe.
pub(crate) enum Step<A, U: 'static> {
    /// Maps the outcome synchronously.
    Forward(Box<dyn FnOnce(A) -> Result<U>>),
    /// Derives a continuation Block.
    Derive(Box<dyn FnOnce(A) -> Block<U>>),
}

impl<A: 'static, U: 'static> Step<A, U> {
    pub(crate) fn forward(f: impl FnOnce(A) -> Result<U> + 'static) -> Self {
        Self::Forward(Box::new(f))
    }

    pub(crate) fn derive(f: impl FnOnce(A) -> Block<U> + 'static) -> Self {
        Self::Derive(Box::new(f))
    }

    /// Normalizes a user handler's result through [`IntoBlock`].
    pub(crate) fn handler<R: IntoBlock<U>>(f: impl FnOnce(A) -> R + 'static) -> Self {
        Self::derive(move |input| run_cont(f, input))
    }
}

type Continuation<U> = Rc<RefCell<Option<Block<U>>>>;

fn advance<A, U: 'static>(step: Step<A, U>, input: A, target: &Block<U>, slot: &Continuation<U>) {
    match step {
        Step::Forward(f) => {
            let outcome = catch_unwind(AssertUnwindSafe(move || f(input)))
                .unwrap_or_else(|payload| Err(Error::panicked(payload)));
            target.settle(outcome);
        }
        Step::Derive(f) => {
            let cont = match catch_unwind(AssertUnwindSafe(move || f(input))) {
                Ok(cont) => cont,
                Err(payload) => {
                    target.settle(Err(Error::panicked(payload)));
                    return;
                }
            };
            guard_tie(target, cont, slot);
        }
    }
}

/// Ties `cont` so its outcome settles `owner`, unless `owner` was aborted in
/// the meantime, in which case `cont` is aborted instead.
fn guard_tie<U: 'static>(owner: &Block<U>, cont: Block<U>, slot: &Continuation<U>) {
    if owner.is_aborted() {
        cont.abort_in(&mut ErrorTrap::unarmed());
        return;
    }
    *slot.borrow_mut() = Some(cont.share());
    let on_ok = owner.share();
    let on_err = owner.share();
    let tied = cont.tie(
        move |value| on_ok.settle(Ok(value)),
        move |err| on_err.settle(Err(err)),
    );
    if let Err(err) = tied {
        let stale = slot.borrow_mut().take();
        drop(stale);
        owner.settle(Err(err));
    }
}

impl<T: 'static> Block<T> {
    /// Core pipe with type-erased steps and an optional abort hook.
    pub(crate) fn pipe_parts<U: 'static>(
        self,
        on_success: Step<T, U>,
        on_error: Step<Error, U>,
        on_abort: Option<AbortAction>,
    ) -> Block<U> {
        if self.is_aborted() {
            warn!(block = %self.id(), "pipe on an aborted block");
            return Block::aborted();
        }

        let result = Block::<U>::running();
        let slot: Continuation<U> = Rc::new(RefCell::new(None));

        let source = self.share();
        let abort_slot = Rc::clone(&slot);
        result.set_abort_action(move |trap: &mut ErrorTrap| {
            let cont = abort_slot.borrow_mut().take();
            match cont {
                Some(cont) => cont.abort_in(trap),
                None => {
                    source.abort_in(trap);
                    if let Some(hook) = on_abort {
                        hook(trap);
                    }
                }
            }
        });

        let (ok_target, err_target) = (result.share(), result.share());
        let (ok_slot, err_slot) = (Rc::clone(&slot), slot);
        let tied = self.tie(
            move |value| advance(on_success, value, &ok_target, &ok_slot),
            move |err| advance(on_error, err, &err_target, &err_slot),
        );
        if let Err(err) = tied {
            result.settle(Err(err));
        }
        result
    }

    /// Runs `on_success` or `on_error` when this Block settles.
    ///
    /// Handler results are normalized with [`IntoBlock`]; a panicking
    /// handler fails the result with
    /// [`ErrorKind::Panicked`](crate::error::ErrorKind::Panicked).
    pub fn pipe<U, S, RS, E, RE>(self, on_success: S, on_error: E) -> Block<U>
    where
        U: 'static,
        S: FnOnce(T) -> RS + 'static,
        RS: IntoBlock<U>,
        E: FnOnce(Error) -> RE + 'static,
        RE: IntoBlock<U>,
    {
        self.pipe_parts(Step::handler(on_success), Step::handler(on_error), None)
    }

    /// Like [`pipe`](Self::pipe), with a hook that runs if the result is
    /// aborted before this Block settles. The hook's Block is aborted at once.
    pub fn pipe_with_abort<U, S, RS, E, RE, A, RA, V>(
        self,
        on_success: S,
        on_error: E,
        on_abort: A,
    ) -> Block<U>
    where
        U: 'static,
        V: 'static,
        S: FnOnce(T) -> RS + 'static,
        RS: IntoBlock<U>,
        E: FnOnce(Error) -> RE + 'static,
        RE: IntoBlock<U>,
        A: FnOnce() -> RA + 'static,
        RA: IntoBlock<V>,
    {
        let hook: AbortAction = Box::new(move |trap: &mut ErrorTrap| abort_cleanup::<V, RA>(trap, on_abort));
        self.pipe_parts(
            Step::handler(on_success),
            Step::handler(on_error),
            Some(hook),
        )
    }

    /// Runs `on_success` on success; failures pass through.
    pub fn then<U, S, RS>(self, on_success: S) -> Block<U>
    where
        U: 'static,
        S: FnOnce(T) -> RS + 'static,
        RS: IntoBlock<U>,
    {
        self.pipe_parts(Step::handler(on_success), Step::forward(Err), None)
    }

    /// Runs `on_error` on failure; values pass through.
    pub fn or_else<E, RE>(self, on_error: E) -> Block<T>
    where
        E: FnOnce(Error) -> RE + 'static,
        RE: IntoBlock<T>,
    {
        self.pipe_parts(Step::forward(Ok), Step::handler(on_error), None)
    }

    /// Runs `func(true)` after success, `func(false)` after failure or abort.
    ///
    /// The original outcome is re-delivered once the cleanup Block succeeds;
    /// a failing cleanup replaces it. On abort the cleanup Block is aborted.
    pub fn exit<F, R, V>(self, func: F) -> Block<T>
    where
        F: FnOnce(bool) -> R + 'static,
        R: IntoBlock<V>,
        V: 'static,
    {
        let shared = Rc::new(Cell::new(Some(func)));
        let (on_ok, on_err, on_abort) = (Rc::clone(&shared), Rc::clone(&shared), shared);

        let success = Step::derive(move |value: T| match on_ok.take() {
            Some(f) => run_cont::<_, V, R>(f, true)
                .pipe_parts(Step::forward(move |_| Ok(value)), Step::forward(Err), None),
            None => Block::settled(Ok(value)),
        });
        let failure = Step::derive(move |err: Error| match on_err.take() {
            Some(f) => run_cont::<_, V, R>(f, false)
                .pipe_parts(Step::forward(move |_| Err(err)), Step::forward(Err), None),
            None => Block::settled(Err(err)),
        });
        let hook: AbortAction = Box::new(move |trap: &mut ErrorTrap| {
            if let Some(f) = on_abort.take() {
                abort_cleanup::<V, R>(trap, move || f(false));
            }
        });
        self.pipe_parts(success, failure, Some(hook))
    }
}
