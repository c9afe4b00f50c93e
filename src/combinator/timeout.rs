//! Timer-backed combinators: `wait` and `timeout`.
//!
//! Both delegate to the host entered on the current thread. Without one
//! they fail with [`ErrorKind::HostUnavailable`](crate::error::ErrorKind::HostUnavailable).

use super::race::race;
use crate::block::{implement, Block, Cancel, Resolver};
use crate::error::Error;
use crate::runtime;
use std::time::Duration;

/// Succeeds with `()` after `delay`. Aborting clears the host timer.
///
/// ```
/// use abb::{wait, LabLoop};
/// use std::time::Duration;
///
/// let lab = LabLoop::new();
/// let _guard = lab.enter();
/// let timer = wait(Duration::from_millis(100));
/// lab.advance(Duration::from_millis(99));
/// assert_eq!(timer.state(), abb::BlockState::Running);
/// lab.advance(Duration::from_millis(1));
/// assert_eq!(timer.state(), abb::BlockState::Success);
/// ```
pub fn wait(delay: Duration) -> Block<()> {
    implement(move |resolver: Resolver<()>| {
        let timer = runtime::set_timeout(delay, Box::new(move || resolver.resolve(())))?;
        Ok::<_, Error>(Cancel::from_fn(move || timer.clear()))
    })
}

/// Fails with [`ErrorKind::TimedOut`](crate::error::ErrorKind::TimedOut)
/// after `delay`.
pub fn timeout<T: 'static>(delay: Duration) -> Block<T> {
    wait(delay).fail(Error::timed_out())
}

impl<T: 'static> Block<T> {
    /// Races this Block against [`timeout`]. The loser is aborted.
    pub fn timeout(self, delay: Duration) -> Block<T> {
        race(vec![self, timeout(delay)], std::convert::identity)
    }
}
