//! Combinator integration tests.
//!
//! Exercises pipe, exit, recovery, the join/race pair, map and retry
//! against the public API on a lab loop.

mod common;

use abb::{
    all, any, error, implement, retry, retry_n, success, Block, BlockState, Cancel, Error,
    ErrorKind, Guard, Resolver,
};
use common::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn flaky(calls: &Rc<Cell<u32>>, succeed_on: u32) -> impl FnMut() -> Block<&'static str> {
    let calls = Rc::clone(calls);
    move || {
        calls.set(calls.get() + 1);
        if calls.get() == succeed_on {
            success("ok")
        } else {
            error(Error::named("Flaky", format!("attempt {}", calls.get())))
        }
    }
}

#[test]
fn pipe_picks_the_handler_for_each_outcome() {
    test_phase!("pipe_picks_the_handler_for_each_outcome");
    let lab = test_lab();
    let _guard = lab.enter();

    let ok_ok = capture(success(1).pipe(|v: i32| v + 1, |_| -1));
    let ok_err = capture(success(1).pipe(|_: i32| Err::<i32, _>("bad"), |_| -1));
    let err_ok = capture(error::<i32>("first").pipe(|v: i32| v, |_| 7));
    let err_err = capture(
        error::<i32>("first").pipe(|v: i32| v, |e: Error| error::<i32>(format!("{e} again"))),
    );
    lab.run_until_idle();

    assert_eq!(ok_ok.take().unwrap().unwrap(), 2);
    assert_eq!(ok_err.take().unwrap().unwrap_err().message(), Some("bad"));
    assert_eq!(err_ok.take().unwrap().unwrap(), 7);
    assert_eq!(
        err_err.take().unwrap().unwrap_err().message(),
        Some("Error: first again")
    );
    test_complete!("pipe_picks_the_handler_for_each_outcome");
}

#[test]
fn abort_hook_runs_after_the_source_is_cancelled() {
    let lab = test_lab();
    let _guard = lab.enter();
    let order = Rc::new(RefCell::new(Vec::new()));
    let hook_cancelled = Rc::new(Cell::new(0));

    let source_log = Rc::clone(&order);
    let source = implement(move |_r: Resolver<()>| {
        Cancel::from_fn(move || source_log.borrow_mut().push("source"))
    });
    let (hook_log, hook_counter) = (Rc::clone(&order), Rc::clone(&hook_cancelled));
    let piped: Block<()> = source.pipe_with_abort(
        |()| -> () { panic!("success handler must not run") },
        |_| -> () { panic!("error handler must not run") },
        move || {
            hook_log.borrow_mut().push("hook");
            pending::<()>(&hook_counter)
        },
    );

    piped.abort().unwrap();
    assert_eq!(*order.borrow(), vec!["source", "hook"]);
    assert_eq!(hook_cancelled.get(), 1);
    lab.run_until_idle();
    assert!(lab.take_unhandled().is_empty());
}

#[test]
fn panicking_abort_hook_surfaces_from_abort() {
    let lab = test_lab();
    let _guard = lab.enter();
    let piped: Block<()> = success(()).pipe_with_abort(
        |()| (),
        |_| (),
        || -> Block<()> { panic!("oops") },
    );
    let err = piped.abort().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Panicked);
    assert_eq!(err.message(), Some("oops"));
    lab.run_until_idle();
    assert!(lab.take_unhandled().is_empty());
}

#[test]
fn exit_after_success_redelivers_the_value() {
    let lab = test_lab();
    let _guard = lab.enter();
    let flags = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&flags);
    let out = capture(success(1).exit(move |ok| {
        log.borrow_mut().push(ok);
        2
    }));
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap(), 1);
    assert_eq!(*flags.borrow(), vec![true]);
}

#[test]
fn failing_cleanup_replaces_the_value() {
    let lab = test_lab();
    let _guard = lab.enter();
    let out = capture(success(1).exit(|ok| {
        assert!(ok);
        error::<()>(Error::named("CleanupFailed", "disk full"))
    }));
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap_err().name(), "CleanupFailed");
}

#[test]
fn exit_after_failure_waits_for_cleanup_then_fails() {
    let lab = test_lab();
    let _guard = lab.enter();
    let (cleanup, done) = deferred::<()>();
    let out = capture(error::<i32>(Error::named("Original", "x")).exit(move |ok| {
        assert!(!ok);
        cleanup
    }));

    lab.run_until_idle();
    assert!(out.borrow().is_none(), "failure delivered before cleanup");
    done.resolve(());
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap_err().name(), "Original");
}

#[test]
fn exit_on_abort_calls_func_with_false_and_aborts_cleanup() {
    let lab = test_lab();
    let _guard = lab.enter();
    let cancelled = Rc::new(Cell::new(0));
    let flags = Rc::new(RefCell::new(Vec::new()));
    let (log, counter) = (Rc::clone(&flags), Rc::clone(&cancelled));
    let block = success(()).exit(move |ok| {
        log.borrow_mut().push(ok);
        pending::<()>(&counter)
    });
    block.abort().unwrap();
    assert_eq!(*flags.borrow(), vec![false]);
    assert_eq!(cancelled.get(), 1);
    lab.run_until_idle();
    assert_eq!(*flags.borrow(), vec![false]);
}

#[test]
fn suppress_replaces_failures_only() {
    let lab = test_lab();
    let _guard = lab.enter();
    let kept = capture(success(12).suppress(100));
    let replaced = capture(error::<i32>("error").suppress(100));
    lab.run_until_idle();
    assert_eq!(kept.take().unwrap().unwrap(), 12);
    assert_eq!(replaced.take().unwrap().unwrap(), 100);
}

#[test]
fn guarded_recovery_passes_other_failures_through() {
    let lab = test_lab();
    let _guard = lab.enter();
    let by_name = capture(
        error::<u32>(Error::named("NotFound", "missing"))
            .except_when("NotFound", |_| 0_u32),
    );
    let other = capture(
        error::<u32>(Error::named("Denied", "nope")).except_when("NotFound", |_| 0_u32),
    );
    let by_kind = capture(error::<u32>(Error::timed_out()).suppress_when(ErrorKind::TimedOut, 5));
    let either = capture(
        error::<u32>(Error::named("Denied", "nope"))
            .suppress_when(vec![Guard::from("NotFound"), Guard::from("Denied")], 9),
    );
    lab.run_until_idle();

    assert_eq!(by_name.take().unwrap().unwrap(), 0);
    assert_eq!(other.take().unwrap().unwrap_err().name(), "Denied");
    assert_eq!(by_kind.take().unwrap().unwrap(), 5);
    assert_eq!(either.take().unwrap().unwrap(), 9);
}

#[test]
fn any_of_nothing_is_none() {
    let lab = test_lab();
    let _guard = lab.enter();
    let out = capture(any(Vec::<Block<u8>>::new()));
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap(), None);
}

#[test]
fn any_takes_the_first_to_fire() {
    let lab = test_lab();
    let _guard = lab.enter();
    let first_ok = capture(any(vec![success(10), error(Error::named("Late", "x"))]));
    let first_err = capture(any(vec![error(Error::named("Early", "x")), success(10)]));
    lab.run_until_idle();
    assert_eq!(first_ok.take().unwrap().unwrap(), Some(10));
    assert_eq!(first_err.take().unwrap().unwrap_err().name(), "Early");
}

#[test]
fn any_aborts_the_losers() {
    let lab = test_lab();
    let _guard = lab.enter();
    let cancelled = Rc::new(Cell::new(0));
    let (winner, resolver) = deferred::<u8>();
    let out = capture(any(vec![
        winner,
        pending::<u8>(&cancelled),
        pending::<u8>(&cancelled),
    ]));
    resolver.resolve(3);
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap(), Some(3));
    assert_eq!(cancelled.get(), 2);
}

#[test]
fn aborting_any_or_all_aborts_every_input() {
    let lab = test_lab();
    let _guard = lab.enter();
    let cancelled = Rc::new(Cell::new(0));
    any(vec![pending::<u8>(&cancelled), pending::<u8>(&cancelled)])
        .abort()
        .unwrap();
    assert_eq!(cancelled.get(), 2);
    all(vec![pending::<u8>(&cancelled), pending::<u8>(&cancelled)])
        .abort()
        .unwrap();
    assert_eq!(cancelled.get(), 4);
}

#[test]
fn all_collects_in_input_order() {
    let lab = test_lab();
    let _guard = lab.enter();
    let empty = capture(all(Vec::<Block<u8>>::new()));
    let values = capture(all(vec![10, 11, 12]));
    lab.run_until_idle();
    assert!(empty.take().unwrap().unwrap().is_empty());
    assert_eq!(values.take().unwrap().unwrap(), vec![10, 11, 12]);
}

#[test]
fn all_fails_fast_and_aborts_the_rest() {
    let lab = test_lab();
    let _guard = lab.enter();
    let cancelled = Rc::new(Cell::new(0));
    let out = capture(all(vec![
        success(10),
        error(Error::named("Expected", "x")),
        pending::<i32>(&cancelled),
    ]));
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap_err().name(), "Expected");
    assert_eq!(cancelled.get(), 1);
    assert!(lab.take_unhandled().is_empty());
}

#[test]
fn map_limit_keeps_order_under_a_limit() {
    let lab = test_lab();
    let _guard = lab.enter();
    let live = Rc::new(Cell::new(0_usize));
    let peak = Rc::new(Cell::new(0_usize));
    let resolvers = Rc::new(RefCell::new(Vec::new()));
    let (l, p, r) = (Rc::clone(&live), Rc::clone(&peak), Rc::clone(&resolvers));
    let out = capture(success(vec![1, 2, 3, 4, 5]).map_limit(2, move |n: i32| {
        l.set(l.get() + 1);
        p.set(p.get().max(l.get()));
        let (block, resolver) = deferred::<i32>();
        r.borrow_mut().push((n, resolver));
        block
    }));

    lab.run_until_idle();
    loop {
        let next = resolvers.borrow_mut().pop();
        let Some((n, resolver)) = next else { break };
        live.set(live.get() - 1);
        resolver.resolve(n * 10);
        lab.run_until_idle();
    }
    assert_eq!(peak.get(), 2);
    assert_eq!(out.take().unwrap().unwrap(), vec![10, 20, 30, 40, 50]);
}

#[test]
fn unpack_spreads_tuples() {
    let lab = test_lab();
    let _guard = lab.enter();
    let out = capture(
        all(vec![success(2), success(3)])
            .then(|v: Vec<i32>| (v[0], v[1], "sum"))
            .unpack(|a: i32, b: i32, label: &'static str| format!("{label}={}", a + b)),
    );
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap(), "sum=5");
}

#[test]
fn retry_n_succeeds_within_the_limit() {
    let lab = test_lab();
    let _guard = lab.enter();
    let calls = Rc::new(Cell::new(0));
    let out = capture(retry_n(flaky(&calls, 3), 3));
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap(), "ok");
    assert_eq!(calls.get(), 3);
}

#[test]
fn unlimited_retry_keeps_going() {
    let lab = test_lab();
    let _guard = lab.enter();
    let calls = Rc::new(Cell::new(0));
    let out = capture(retry(flaky(&calls, 20)));
    lab.run_until_idle();
    assert_eq!(out.take().unwrap().unwrap(), "ok");
    assert_eq!(calls.get(), 20);
}

#[test]
fn retry_n_gives_up_with_the_last_failure() {
    let lab = test_lab();
    let _guard = lab.enter();
    let calls = Rc::new(Cell::new(0));
    let out = capture(retry_n(flaky(&calls, 4), 2));
    lab.run_until_idle();
    let err = out.take().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RetryLimitReached);
    let last = err.source_ref().unwrap().downcast_ref::<Error>().unwrap();
    assert_eq!(last.message(), Some("attempt 3"));
    assert_eq!(calls.get(), 3);
}

#[test]
fn aborted_retry_stops_attempting() {
    let lab = test_lab();
    let _guard = lab.enter();
    let calls = Rc::new(Cell::new(0));
    let handle_slot: Rc<RefCell<Option<abb::block::AbortHandle>>> = Rc::new(RefCell::new(None));
    let (counter, slot) = (Rc::clone(&calls), Rc::clone(&handle_slot));
    let block = retry_n(
        move || {
            counter.set(counter.get() + 1);
            if counter.get() == 2 {
                if let Some(handle) = slot.borrow().as_ref() {
                    handle.abort().unwrap();
                }
            }
            error::<()>("again")
        },
        10,
    );
    *handle_slot.borrow_mut() = Some(block.abort_handle());
    lab.run_until_idle();
    assert_eq!(calls.get(), 2);
    assert_eq!(block.state(), BlockState::Aborted);
}
