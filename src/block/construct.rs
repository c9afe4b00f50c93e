//! Block constructors and the conversions handler results go through.

use super::{Block, ErrorTrap};
use crate::error::{Error, ErrorKind, Result};
use core::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A Block that already succeeded with `value`.
pub fn success<T: 'static>(value: T) -> Block<T> {
    Block::settled(Ok(value))
}

/// A Block that already failed with `reason`.
pub fn error<T: 'static>(reason: impl Into<Error>) -> Block<T> {
    Block::settled(Err(reason.into()))
}

/// A settled Block from a `Result`.
pub fn from_result<T: 'static, E: Into<Error>>(result: core::result::Result<T, E>) -> Block<T> {
    Block::settled(result.map_err(Into::into))
}

/// Adopts an existing Block.
///
/// # Errors
///
/// [`ErrorKind::CannotWrap`] if the Block was aborted.
pub fn from_block<T: 'static>(block: Block<T>) -> Result<Block<T>> {
    if block.is_aborted() {
        return Err(Error::usage(
            ErrorKind::CannotWrap,
            "cannot wrap an aborted block",
        ));
    }
    Ok(block)
}

/// Normalizes any supported value into a Block.
pub fn wrap<T: 'static>(value: impl IntoBlock<T>) -> Block<T> {
    value.into_block()
}

/// A foreign asynchronous value exposing `then(on_resolved, on_rejected)`.
pub trait Thenable<T> {
    /// Registers the callbacks. Either may be called, at most once, at any
    /// later point or synchronously.
    fn then(self, on_resolved: Box<dyn FnOnce(T)>, on_rejected: Box<dyn FnOnce(Error)>);
}

/// Adapts a [`Thenable`]. The resulting Block cannot cancel the foreign value.
pub fn from_thenable<T: 'static>(thenable: impl Thenable<T>) -> Block<T> {
    let block = Block::running();
    let on_ok = block.share();
    let on_err = block.share();
    let registered = catch_unwind(AssertUnwindSafe(move || {
        thenable.then(
            Box::new(move |value| on_ok.settle(Ok(value))),
            Box::new(move |err| on_err.settle(Err(err))),
        );
    }));
    if let Err(payload) = registered {
        block.settle(Err(Error::panicked(payload)));
    }
    block
}

/// Settles the Block an [`implement`] starter was given.
pub struct Resolver<T: 'static> {
    block: Block<T>,
}

impl<T: 'static> Resolver<T> {
    /// Delivers a value.
    pub fn resolve(&self, value: T) {
        self.block.settle(Ok(value));
    }

    /// Delivers a failure.
    pub fn reject(&self, reason: impl Into<Error>) {
        self.block.settle(Err(reason.into()));
    }

    /// Delivers an outcome.
    pub fn settle(&self, outcome: Result<T>) {
        self.block.settle(outcome);
    }

    /// Returns true while no outcome was delivered and the Block is not aborted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.block.state() == crate::types::BlockState::Running
    }
}

impl<T: 'static> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            block: self.block.share(),
        }
    }
}

impl<T: 'static> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("block", &self.block.id())
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// A cancel action returned by an [`implement`] starter.
pub struct Cancel {
    action: Box<dyn FnOnce() -> Result<()>>,
}

impl Cancel {
    /// A cancel action that may fail.
    pub fn new(action: impl FnOnce() -> Result<()> + 'static) -> Self {
        Self {
            action: Box::new(action),
        }
    }

    /// A cancel action that cannot fail.
    pub fn from_fn(action: impl FnOnce() + 'static) -> Self {
        Self::new(move || {
            action();
            Ok(())
        })
    }

    fn run(self) -> Result<()> {
        (self.action)()
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cancel")
    }
}

/// What an [`implement`] starter may return.
pub trait IntoCancel {
    /// `Ok(None)`: nothing to cancel. `Err`: the Block fails immediately.
    fn into_cancel(self) -> Result<Option<Cancel>>;
}

impl IntoCancel for () {
    fn into_cancel(self) -> Result<Option<Cancel>> {
        Ok(None)
    }
}

impl IntoCancel for Cancel {
    fn into_cancel(self) -> Result<Option<Cancel>> {
        Ok(Some(self))
    }
}

impl IntoCancel for Option<Cancel> {
    fn into_cancel(self) -> Result<Option<Cancel>> {
        Ok(self)
    }
}

impl<C: IntoCancel, E: Into<Error>> IntoCancel for core::result::Result<C, E> {
    fn into_cancel(self) -> Result<Option<Cancel>> {
        self.map_err(Into::into)?.into_cancel()
    }
}

/// Builds a Block from a starter that receives its [`Resolver`].
///
/// The starter runs synchronously. Whatever cancel action it returns becomes
/// the Block's abort action; a failure or panic from that action is captured
/// by the abort that triggered it. A panic in the starter fails the Block.
///
/// ```
/// use abb::{implement, Cancel, Resolver};
///
/// let block = implement(|resolver: Resolver<u32>| {
///     resolver.resolve(7);
///     Cancel::from_fn(|| unreachable!("already settled"))
/// });
/// assert_eq!(block.state(), abb::BlockState::Success);
/// ```
pub fn implement<T, F, C>(starter: F) -> Block<T>
where
    T: 'static,
    F: FnOnce(Resolver<T>) -> C,
    C: IntoCancel,
{
    let block = Block::running();
    let resolver = Resolver {
        block: block.share(),
    };
    match catch_unwind(AssertUnwindSafe(move || starter(resolver).into_cancel())) {
        Ok(Ok(Some(cancel))) => {
            block.set_abort_action(move |trap: &mut ErrorTrap| trap.guard(|| cancel.run()));
        }
        Ok(Ok(None)) => {}
        Ok(Err(err)) => block.settle(Err(err)),
        Err(payload) => block.settle(Err(Error::panicked(payload))),
    }
    block
}

/// Conversion of handler results into Blocks.
///
/// Plain values become successful Blocks, `Result`s settle accordingly and a
/// Block is adopted as is. Types without an implementation are rejected at
/// compile time.
pub trait IntoBlock<T: 'static> {
    /// Performs the conversion.
    fn into_block(self) -> Block<T>;
}

impl<T: 'static> IntoBlock<T> for Block<T> {
    fn into_block(self) -> Block<T> {
        match from_block(self) {
            Ok(block) => block,
            Err(err) => Block::settled(Err(err)),
        }
    }
}

impl<T: 'static, E: Into<Error>> IntoBlock<T> for core::result::Result<T, E> {
    fn into_block(self) -> Block<T> {
        from_result(self)
    }
}

impl<T: 'static> IntoBlock<Option<T>> for Option<T> {
    fn into_block(self) -> Block<Self> {
        success(self)
    }
}

impl<T: 'static> IntoBlock<Vec<T>> for Vec<T> {
    fn into_block(self) -> Block<Self> {
        success(self)
    }
}

macro_rules! value_into_block {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoBlock<$ty> for $ty {
                fn into_block(self) -> Block<$ty> {
                    success(self)
                }
            }
        )*
    };
}

value_into_block!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
);

macro_rules! tuple_into_block {
    ($($name:ident),+) => {
        impl<$($name: 'static),+> IntoBlock<($($name,)+)> for ($($name,)+) {
            fn into_block(self) -> Block<Self> {
                success(self)
            }
        }
    };
}

tuple_into_block!(A, B);
tuple_into_block!(A, B, C);
tuple_into_block!(A, B, C, D);

/// Runs a continuation, turning a panic into a failed Block.
pub(crate) fn run_cont<A, U, R>(f: impl FnOnce(A) -> R, input: A) -> Block<U>
where
    U: 'static,
    R: IntoBlock<U>,
{
    match catch_unwind(AssertUnwindSafe(move || f(input))) {
        Ok(result) => result.into_block(),
        Err(payload) => Block::settled(Err(Error::panicked(payload))),
    }
}

/// Runs an abort hook and aborts the Block it returns.
///
/// A hook that fails (by returning a failure or panicking) has its failure
/// recorded in `trap`.
pub(crate) fn abort_cleanup<V, R>(trap: &mut ErrorTrap, hook: impl FnOnce() -> R)
where
    V: 'static,
    R: IntoBlock<V>,
{
    let block: Block<V> = run_cont(|()| hook(), ());
    match block.take_failure() {
        Some(err) => trap.record(err),
        None => block.abort_in(trap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::LabLoop;
    use crate::test_utils::capture;
    use crate::types::BlockState;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn wrap_primitives_succeed() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let a = capture(wrap(12_i32));
        let b = capture(wrap("text"));
        let c = capture(wrap(()));
        let d = capture(wrap(None::<u8>));
        let e = capture(wrap(vec![1_u8, 2]));
        let f = capture(wrap(String::from("owned")));
        assert!(a.borrow().is_none(), "delivery is deferred");

        lab.run_until_idle();
        assert_eq!(a.take().unwrap().unwrap(), 12);
        assert_eq!(b.take().unwrap().unwrap(), "text");
        c.take().unwrap().unwrap();
        assert_eq!(d.take().unwrap().unwrap(), None);
        assert_eq!(e.take().unwrap().unwrap(), vec![1, 2]);
        assert_eq!(f.take().unwrap().unwrap(), "owned");
    }

    #[test]
    fn wrap_results() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let ok = capture(wrap(Ok::<_, Error>(3_u8)));
        let err = capture(wrap(Err::<u8, _>(Error::named("Bad", "no"))));
        lab.run_until_idle();
        assert_eq!(ok.take().unwrap().unwrap(), 3);
        assert_eq!(err.take().unwrap().unwrap_err().name(), "Bad");
    }

    #[test]
    fn wrap_aborted_block_fails_with_cannot_wrap() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let aborted = implement(|_r: Resolver<i32>| ());
        aborted.abort().unwrap();
        let wrapped = capture(wrap(aborted));
        lab.run_until_idle();
        let err = wrapped.take().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotWrap);
    }

    #[test]
    fn wrap_live_block_is_identity() {
        crate::test_utils::init_test_logging();
        let block = implement(|_r: Resolver<i32>| ());
        let id = block.id();
        assert_eq!(wrap(block).id(), id);
    }

    #[test]
    fn from_block_rejects_aborted() {
        crate::test_utils::init_test_logging();
        let block = implement(|_r: Resolver<i32>| ());
        block.abort().unwrap();
        let err = from_block(block).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotWrap);
        assert!(from_block(success(1)).is_ok());
    }

    #[test]
    fn implement_resolves_later() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let stash = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&stash);
        let block = implement(move |r: Resolver<&'static str>| {
            *keep.borrow_mut() = Some(r);
        });
        let out = capture(block);
        lab.run_until_idle();
        assert!(out.borrow().is_none());

        let resolver = stash.borrow_mut().take().unwrap();
        assert!(resolver.is_pending());
        resolver.resolve("later");
        assert!(!resolver.is_pending());
        resolver.reject("ignored");
        lab.run_until_idle();
        assert_eq!(out.take().unwrap().unwrap(), "later");
    }

    #[test]
    fn implement_err_fails_block() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let block = implement(|_r: Resolver<()>| Err::<Cancel, _>("refused"));
        assert_eq!(block.state(), BlockState::Error);
        let out = capture(block);
        lab.run_until_idle();
        assert_eq!(out.take().unwrap().unwrap_err().message(), Some("refused"));
    }

    #[test]
    fn implement_panic_fails_block() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let block = implement(|_r: Resolver<()>| -> () { panic!("starter blew up") });
        let out = capture(block);
        lab.run_until_idle();
        let err = out.take().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert_eq!(err.message(), Some("starter blew up"));
    }

    #[test]
    fn cancel_failure_surfaces_from_abort() {
        crate::test_utils::init_test_logging();
        let block = implement(|_r: Resolver<()>| Cancel::new(|| Err(Error::user("oops"))));
        let err = block.abort().unwrap_err();
        assert_eq!(err.message(), Some("oops"));

        let block = implement(|_r: Resolver<()>| Some(Cancel::from_fn(|| panic!("cancel panic"))));
        let err = block.abort().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
    }

    #[test]
    fn cancel_not_run_after_settle() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let block = implement(move |r: Resolver<u8>| {
            r.resolve(1);
            Cancel::from_fn(move || flag.set(true))
        });
        block.abort().unwrap();
        assert!(!ran.get());
    }

    struct FakeThenable {
        slot: Rc<RefCell<Option<(Box<dyn FnOnce(u32)>, Box<dyn FnOnce(Error)>)>>>,
    }

    impl Thenable<u32> for FakeThenable {
        fn then(self, on_resolved: Box<dyn FnOnce(u32)>, on_rejected: Box<dyn FnOnce(Error)>) {
            *self.slot.borrow_mut() = Some((on_resolved, on_rejected));
        }
    }

    #[test]
    fn thenable_resolution_and_rejection() {
        let lab = LabLoop::new();
        let _guard = lab.enter();

        let slot = Rc::new(RefCell::new(None));
        let out = capture(from_thenable(FakeThenable {
            slot: Rc::clone(&slot),
        }));
        let (resolve, _) = slot.borrow_mut().take().unwrap();
        resolve(42);
        lab.run_until_idle();
        assert_eq!(out.take().unwrap().unwrap(), 42);

        let out = capture(from_thenable(FakeThenable {
            slot: Rc::clone(&slot),
        }));
        let (_, reject) = slot.borrow_mut().take().unwrap();
        reject(Error::named("Foreign", "rejected"));
        lab.run_until_idle();
        assert_eq!(out.take().unwrap().unwrap_err().name(), "Foreign");
    }

    struct ExplodingThenable;

    impl Thenable<u32> for ExplodingThenable {
        fn then(self, _: Box<dyn FnOnce(u32)>, _: Box<dyn FnOnce(Error)>) {
            panic!("then exploded");
        }
    }

    #[test]
    fn thenable_panic_fails_block() {
        let lab = LabLoop::new();
        let _guard = lab.enter();
        let out = capture(from_thenable(ExplodingThenable));
        lab.run_until_idle();
        assert_eq!(out.take().unwrap().unwrap_err().kind(), ErrorKind::Panicked);
    }
}
