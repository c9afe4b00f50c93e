//! Retry combinators with optional exponential backoff.
//!
//! `retry` re-invokes a Block factory while the Blocks it returns fail.
//! The first success is delivered. With a retry limit, the last failure is
//! wrapped in [`ErrorKind::RetryLimitReached`](crate::error::ErrorKind::RetryLimitReached)
//! once the limit is exhausted.
//!
//! # Backoff
//!
//! Delays follow `initial_delay * multiplier^(retry - 1)`, capped at
//! `max_delay`. Retry `n` is the `n`th re-invocation after the first
//! attempt. A zero delay re-invokes on the next dispatch turn without
//! touching a host timer.

use super::timeout::wait;
use crate::block::{run_cont, Block, ErrorTrap, IntoBlock};
use crate::error::Error;
use crate::tracing_compat::debug;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Limits and backoff for [`retry_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Unlimited immediate retries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Caps the number of retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the delay before the first retry. Raises `max_delay` to match
    /// if it was lower.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self.max_delay = self.max_delay.max(delay);
        self
    }

    /// Sets the maximum delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier. Values below 1.0 are raised to 1.0.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// A policy with a fixed delay between retries.
    #[must_use]
    pub fn fixed_delay(delay: Duration) -> Self {
        Self::new().with_initial_delay(delay).with_max_delay(delay)
    }

    /// Returns true if another retry is allowed after `retries` retries.
    #[must_use]
    pub fn allows(&self, retries: u32) -> bool {
        self.max_retries.map_or(true, |max| retries < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retry number `retry` (1-based). Retry 0 has no delay.
#[must_use]
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn calculate_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let exponent = retry.saturating_sub(1).min(i32::MAX as u32);
    let factor = policy.multiplier.powi(exponent as i32);
    let base_nanos = policy.initial_delay.as_nanos() as f64 * factor;
    let capped_nanos = base_nanos.min(policy.max_delay.as_nanos() as f64);

    Duration::from_nanos(capped_nanos as u64)
}

struct Retry<F, T: 'static> {
    func: Option<F>,
    policy: RetryPolicy,
    retries: u32,
    current: Current<T>,
}

enum Current<T: 'static> {
    Idle,
    Attempt(Block<T>),
    Backoff(Block<()>),
}

type Shared<F, T> = Rc<RefCell<Retry<F, T>>>;

/// Retries `func` until a Block it returns succeeds.
pub fn retry<T, F, R>(func: F) -> Block<T>
where
    T: 'static,
    F: FnMut() -> R + 'static,
    R: IntoBlock<T>,
{
    retry_with(func, RetryPolicy::new())
}

/// Retries `func` at most `limit` times after the first attempt.
///
/// ```
/// use abb::{error, retry_n, success, LabLoop};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let lab = LabLoop::new();
/// let _guard = lab.enter();
/// let calls = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&calls);
/// let block = retry_n(
///     move || {
///         counter.set(counter.get() + 1);
///         if counter.get() < 3 { error("flaky") } else { success(counter.get()) }
///     },
///     2,
/// );
/// lab.run_until_idle();
/// assert_eq!(block.state(), abb::BlockState::Success);
/// assert_eq!(calls.get(), 3);
/// ```
pub fn retry_n<T, F, R>(func: F, limit: u32) -> Block<T>
where
    T: 'static,
    F: FnMut() -> R + 'static,
    R: IntoBlock<T>,
{
    retry_with(func, RetryPolicy::new().with_max_retries(limit))
}

/// Retries `func` under `policy`.
///
/// Aborting the result aborts the attempt or backoff timer in progress.
pub fn retry_with<T, F, R>(func: F, policy: RetryPolicy) -> Block<T>
where
    T: 'static,
    F: FnMut() -> R + 'static,
    R: IntoBlock<T>,
{
    let result = Block::<T>::running();
    let state: Shared<F, T> = Rc::new(RefCell::new(Retry {
        func: Some(func),
        policy,
        retries: 0,
        current: Current::Idle,
    }));

    let abort_state = Rc::clone(&state);
    result.set_abort_action(move |trap: &mut ErrorTrap| {
        let current = {
            let mut retry = abort_state.borrow_mut();
            retry.func = None;
            std::mem::replace(&mut retry.current, Current::Idle)
        };
        match current {
            Current::Idle => {}
            Current::Attempt(block) => block.abort_in(trap),
            Current::Backoff(block) => block.abort_in(trap),
        }
    });

    attempt(&state, &result);
    result
}

fn attempt<T, F, R>(state: &Shared<F, T>, result: &Block<T>)
where
    T: 'static,
    F: FnMut() -> R + 'static,
    R: IntoBlock<T>,
{
    let Some(mut func) = state.borrow_mut().func.take() else {
        return;
    };
    let block: Block<T> = run_cont(|()| func(), ());
    if result.is_aborted() {
        block.abort_in(&mut ErrorTrap::unarmed());
        return;
    }
    {
        let mut retry = state.borrow_mut();
        retry.func = Some(func);
        retry.current = Current::Attempt(block.share());
    }

    let (ok_result, err_result) = (result.share(), result.share());
    let (ok_state, err_state) = (Rc::clone(state), Rc::clone(state));
    let tied = block.tie(
        move |value| {
            ok_state.borrow_mut().current = Current::Idle;
            ok_result.settle(Ok(value));
        },
        move |err| attempt_failed(&err_state, &err_result, err),
    );
    if let Err(err) = tied {
        result.settle(Err(err));
    }
}

#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
fn attempt_failed<T, F, R>(state: &Shared<F, T>, result: &Block<T>, err: Error)
where
    T: 'static,
    F: FnMut() -> R + 'static,
    R: IntoBlock<T>,
{
    let next = {
        let mut retry = state.borrow_mut();
        retry.current = Current::Idle;
        if retry.policy.allows(retry.retries) {
            retry.retries += 1;
            Some((retry.retries, calculate_delay(&retry.policy, retry.retries)))
        } else {
            retry.func = None;
            None
        }
    };
    let Some((retries, delay)) = next else {
        debug!(error = %err, "retry limit reached");
        result.settle(Err(Error::retry_limit(err)));
        return;
    };
    debug!(retry = retries, delay_ms = delay.as_millis() as u64, error = %err, "retrying");

    if delay.is_zero() {
        attempt(state, result);
        return;
    }

    let backoff = wait(delay);
    state.borrow_mut().current = Current::Backoff(backoff.share());
    let (ok_result, err_result) = (result.share(), result.share());
    let ok_state = Rc::clone(state);
    let tied = backoff.tie(
        move |()| attempt(&ok_state, &ok_result),
        move |err| err_result.settle(Err(err)),
    );
    if let Err(err) = tied {
        result.settle(Err(err));
    }
}
