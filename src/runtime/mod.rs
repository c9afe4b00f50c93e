//! Host environment and the current-host context.
//!
//! Blocks never talk to threads, clocks or OS timers directly. Everything that
//! has to happen "later" goes through a [`Host`]: the dispatch queue asks it
//! for a deferred callback, and `wait`/`timeout`/`periodic` ask it for timers.
//!
//! - [`scheduler`]: picks the deferral primitive once per entered host
//! - [`config`]: [`LoopConfig`] and its environment/TOML overrides
//! - [`event_loop`]: [`EventLoop`], the single-threaded host shipped with abb
//!
//! # Entering a host
//!
//! A host is installed on the current thread with [`enter`], which returns a
//! guard restoring the previously entered host on drop:
//!
//! ```
//! use abb::runtime::EventLoop;
//!
//! let event_loop = EventLoop::new();
//! let _guard = event_loop.enter();
//! let block = abb::success(12).then(|r: i32| r * 2);
//! event_loop.run_until_idle();
//! assert_eq!(block.state(), abb::BlockState::Success);
//! ```

pub mod config;
mod env_config;
pub mod event_loop;
pub mod scheduler;
mod timers;

pub use config::{ConfigError, LoopConfig, UnhandledResponse};
pub use env_config::{
    ENV_HOST_PRIMITIVES, ENV_MAX_RECORDED_UNHANDLED, ENV_UNHANDLED_RESPONSE,
};
pub use event_loop::EventLoop;
pub use scheduler::SchedulerKind;

use crate::error::{Error, Result};
use crate::tracing_compat::{debug, error};
use core::fmt;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Duration;

/// A one-shot callback handed to a host.
pub type Task = Box<dyn FnOnce()>;

/// A repeating callback handed to a host.
pub type RepeatingTask = Box<dyn FnMut()>;

/// Identifier of a timer or interval registered with a host.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Creates a timer ID from a raw value. Hosts allocate these.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerId({})", self.0)
    }
}

/// Deferral primitives a host advertises besides plain timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// The host can run a callback right after the current turn.
    pub immediate: bool,
    /// The host has a microtask queue drained before the next turn.
    pub microtask: bool,
}

impl Capabilities {
    /// Both immediate and microtask primitives.
    pub const ALL: Self = Self {
        immediate: true,
        microtask: true,
    };

    /// Only timers are available.
    pub const TIMERS_ONLY: Self = Self {
        immediate: false,
        microtask: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// The environment a Block graph runs in.
///
/// Hosts are single-threaded and use interior mutability: every method takes
/// `&self` and may be called from inside a callback the host is running.
pub trait Host {
    /// Deferral primitives this host offers.
    fn capabilities(&self) -> Capabilities;

    /// Runs `task` after the current turn.
    fn set_immediate(&self, task: Task) {
        let _ = self.set_timeout(Duration::ZERO, task);
    }

    /// Runs `task` before the next turn.
    fn queue_microtask(&self, task: Task) {
        let _ = self.set_timeout(Duration::ZERO, task);
    }

    /// Runs `task` once after `delay`.
    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancels a pending timeout. Unknown or fired IDs are ignored.
    fn clear_timeout(&self, id: TimerId);

    /// Runs `task` every `period` until cleared.
    fn set_interval(&self, period: Duration, task: RepeatingTask) -> TimerId;

    /// Stops an interval. Unknown IDs are ignored.
    fn clear_interval(&self, id: TimerId);

    /// Receives failures nobody consumed.
    fn report_unhandled(&self, error: Error);
}

struct Current {
    host: Rc<dyn Host>,
    scheduler: SchedulerKind,
}

thread_local! {
    static CURRENT: RefCell<Option<Current>> = const { RefCell::new(None) };
}

/// Guard that restores the previously entered host on drop.
#[must_use = "the host is only entered while the guard is alive"]
pub struct EnterGuard {
    prev: Option<Current>,
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        let replaced = CURRENT.try_with(|slot| std::mem::replace(&mut *slot.borrow_mut(), prev));
        drop(replaced);
        if is_entered() {
            crate::dispatch::host_entered();
        }
    }
}

impl fmt::Debug for EnterGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnterGuard")
            .field("restores_previous", &self.prev.is_some())
            .finish()
    }
}

/// Installs `host` as the current host of this thread.
///
/// The scheduler primitive is chosen here, once, from the host's
/// [`Capabilities`]. Blocks that settled while no host was entered start
/// firing as soon as the host runs its queued callbacks.
pub fn enter(host: Rc<dyn Host>) -> EnterGuard {
    let scheduler = scheduler::select(host.capabilities());
    debug!(scheduler = ?scheduler, "host entered");
    let prev = CURRENT.with(|slot| slot.borrow_mut().replace(Current { host, scheduler }));
    crate::dispatch::host_entered();
    EnterGuard {
        prev,
        _not_send: PhantomData,
    }
}

/// Returns true if a host is entered on this thread.
#[must_use]
pub fn is_entered() -> bool {
    CURRENT
        .try_with(|slot| slot.borrow().is_some())
        .unwrap_or(false)
}

/// Returns the scheduler selected for the current host, if any.
#[must_use]
pub fn current_scheduler() -> Option<SchedulerKind> {
    current().map(|(_, kind)| kind)
}

fn current() -> Option<(Rc<dyn Host>, SchedulerKind)> {
    CURRENT
        .try_with(|slot| {
            slot.borrow()
                .as_ref()
                .map(|cur| (Rc::clone(&cur.host), cur.scheduler))
        })
        .ok()
        .flatten()
}

/// Hands `task` to the current host's deferral primitive.
///
/// Returns false (dropping the task) when no host is entered.
pub(crate) fn schedule(task: Task) -> bool {
    match current() {
        Some((host, kind)) => {
            kind.schedule(&*host, task);
            true
        }
        None => false,
    }
}

/// Routes an unconsumed failure to the current host.
pub(crate) fn report_unhandled(err: Error) {
    match current() {
        Some((host, _)) => host.report_unhandled(err),
        None => {
            error!(error = %err, "unhandled block failure with no host entered");
        }
    }
}

/// A timer registered with a specific host.
///
/// Clearing goes to the host that created the timer, even if another host
/// has been entered since.
pub(crate) struct HostTimer {
    host: Rc<dyn Host>,
    id: TimerId,
    repeating: bool,
}

impl HostTimer {
    pub(crate) fn clear(self) {
        if self.repeating {
            self.host.clear_interval(self.id);
        } else {
            self.host.clear_timeout(self.id);
        }
    }
}

pub(crate) fn set_timeout(delay: Duration, task: Task) -> Result<HostTimer> {
    let (host, _) = current().ok_or_else(|| Error::host_unavailable("set_timeout"))?;
    let id = host.set_timeout(delay, task);
    Ok(HostTimer {
        host,
        id,
        repeating: false,
    })
}

pub(crate) fn set_interval(period: Duration, task: RepeatingTask) -> Result<HostTimer> {
    let (host, _) = current().ok_or_else(|| Error::host_unavailable("set_interval"))?;
    let id = host.set_interval(period, task);
    Ok(HostTimer {
        host,
        id,
        repeating: true,
    })
}
