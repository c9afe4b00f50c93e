//! Single-threaded event loop host.
//!
//! [`EventLoop`] owns three queues: microtasks, immediates and a
//! deadline-ordered timer queue. One call to [`EventLoop::run_until_idle`]
//! keeps running work until all three are empty or only future timers
//! remain. Microtasks always run before immediates, and immediates before
//! due timers.
//!
//! The loop is generic over its [`TimeSource`]: production code uses the
//! [`WallClock`], while [`LabLoop`](crate::lab::LabLoop) drives the same
//! loop with a [`VirtualClock`](crate::time::VirtualClock).

use super::config::{LoopConfig, UnhandledResponse};
use super::timers::TimerQueue;
use super::{Capabilities, EnterGuard, Host, RepeatingTask, Task, TimerId};
use crate::error::Error;
use crate::time::{TimeSource, WallClock};
use crate::tracing_compat::{error, trace};
use crate::types::Time;
use core::fmt;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Shortest period an interval may have.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

enum Callback {
    Once(Task),
    Every { period: Duration, task: RepeatingTask },
}

enum Work {
    Task(Task),
    Interval {
        id: TimerId,
        period: Duration,
        task: RepeatingTask,
    },
}

#[derive(Default)]
struct LoopState {
    microtasks: VecDeque<Task>,
    immediates: VecDeque<Task>,
    timers: TimerQueue,
    callbacks: HashMap<TimerId, Callback>,
    /// Live intervals, including one whose callback is currently running.
    intervals: HashSet<TimerId>,
    next_timer: u64,
    unhandled: Vec<Error>,
}

impl LoopState {
    fn alloc_id(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId::from_raw(self.next_timer)
    }
}

struct LoopCore<C> {
    clock: C,
    config: LoopConfig,
    state: RefCell<LoopState>,
}

impl<C: TimeSource> LoopCore<C> {
    fn next_work(&self) -> Option<Work> {
        let mut st = self.state.borrow_mut();
        if let Some(task) = st.microtasks.pop_front() {
            return Some(Work::Task(task));
        }
        if let Some(task) = st.immediates.pop_front() {
            return Some(Work::Task(task));
        }
        let now = self.clock.now();
        while let Some((deadline, id)) = st.timers.pop_due(now) {
            match st.callbacks.remove(&id) {
                Some(Callback::Once(task)) => return Some(Work::Task(task)),
                Some(Callback::Every { period, task }) => {
                    st.timers.push(deadline + period, id);
                    return Some(Work::Interval { id, period, task });
                }
                None => {}
            }
        }
        None
    }

    fn run(&self, work: Work) {
        match work {
            Work::Task(task) => task(),
            Work::Interval {
                id,
                period,
                mut task,
            } => {
                task();
                let cleared = {
                    let mut st = self.state.borrow_mut();
                    if st.intervals.contains(&id) {
                        st.callbacks.insert(id, Callback::Every { period, task });
                        None
                    } else {
                        Some(task)
                    }
                };
                drop(cleared);
            }
        }
    }

    fn next_deadline(&self) -> Option<Time> {
        let mut st = self.state.borrow_mut();
        let LoopState {
            timers,
            callbacks,
            intervals,
            ..
        } = &mut *st;
        timers.next_deadline(|id| callbacks.contains_key(&id) || intervals.contains(&id))
    }

    fn has_ready_work(&self) -> bool {
        let st = self.state.borrow();
        !st.microtasks.is_empty() || !st.immediates.is_empty()
    }

    fn clear(&self, id: TimerId) {
        let removed = {
            let mut st = self.state.borrow_mut();
            st.intervals.remove(&id);
            st.callbacks.remove(&id)
        };
        drop(removed);
    }
}

impl<C: TimeSource> Host for LoopCore<C> {
    fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    fn set_immediate(&self, task: Task) {
        self.state.borrow_mut().immediates.push_back(task);
    }

    fn queue_microtask(&self, task: Task) {
        self.state.borrow_mut().microtasks.push_back(task);
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId {
        let deadline = self.clock.now() + delay;
        let mut st = self.state.borrow_mut();
        let id = st.alloc_id();
        st.callbacks.insert(id, Callback::Once(task));
        st.timers.push(deadline, id);
        trace!(timer = ?id, deadline = %deadline, "timeout registered");
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.clear(id);
    }

    fn set_interval(&self, period: Duration, task: RepeatingTask) -> TimerId {
        let period = period.max(MIN_INTERVAL);
        let deadline = self.clock.now() + period;
        let mut st = self.state.borrow_mut();
        let id = st.alloc_id();
        st.callbacks.insert(id, Callback::Every { period, task });
        st.intervals.insert(id);
        st.timers.push(deadline, id);
        trace!(timer = ?id, period = ?period, "interval registered");
        id
    }

    fn clear_interval(&self, id: TimerId) {
        self.clear(id);
    }

    fn report_unhandled(&self, err: Error) {
        let limit = self.config.max_recorded_unhandled;
        {
            let mut st = self.state.borrow_mut();
            if limit == 0 || st.unhandled.len() < limit {
                st.unhandled.push(err.clone());
            }
        }
        match self.config.unhandled_response {
            UnhandledResponse::Panic if !std::thread::panicking() => {
                panic!("unhandled block failure: {err}");
            }
            UnhandledResponse::Panic | UnhandledResponse::Log => {
                error!(error = %err, kind = %err.kind(), "unhandled block failure");
            }
            UnhandledResponse::Silent => {}
        }
    }
}

/// A single-threaded event loop implementing [`Host`].
pub struct EventLoop<C: TimeSource + 'static = WallClock> {
    core: Rc<LoopCore<C>>,
}

impl EventLoop<WallClock> {
    /// Creates a wall-clock loop with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates a wall-clock loop with the given configuration.
    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        Self::with_clock(WallClock::new(), config)
    }

    /// Runs until no work and no live timers remain, sleeping between
    /// timer deadlines.
    pub fn run(&self) {
        loop {
            self.run_until_idle();
            let Some(deadline) = self.core.next_deadline() else {
                break;
            };
            let now = self.now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }
    }

    /// Runs for `duration` of wall-clock time, then returns even if work
    /// remains.
    pub fn run_for(&self, duration: Duration) {
        let end = self.now() + duration;
        loop {
            self.run_until_idle();
            let now = self.now();
            if now >= end {
                break;
            }
            let wake = self.core.next_deadline().map_or(end, |d| d.min(end));
            if wake > now {
                std::thread::sleep(wake - now);
            }
        }
    }
}

impl Default for EventLoop<WallClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TimeSource + 'static> EventLoop<C> {
    /// Creates a loop reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: C, config: LoopConfig) -> Self {
        Self {
            core: Rc::new(LoopCore {
                clock,
                config,
                state: RefCell::new(LoopState::default()),
            }),
        }
    }

    /// Installs this loop as the current host of the thread.
    pub fn enter(&self) -> EnterGuard {
        super::enter(Rc::clone(&self.core) as Rc<dyn Host>)
    }

    /// Runs microtasks, immediates and due timers until none are left.
    ///
    /// Returns the number of callbacks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(work) = self.core.next_work() {
            self.core.run(work);
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "loop idle");
        }
        ran
    }

    /// Current time of the loop's clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.core.clock.now()
    }

    /// Number of registered timeouts and intervals not yet fired or cleared.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.core.state.borrow().callbacks.len()
    }

    /// Deadline of the earliest live timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.core.next_deadline()
    }

    /// Returns true if microtasks or immediates are queued.
    #[must_use]
    pub fn has_ready_work(&self) -> bool {
        self.core.has_ready_work()
    }

    /// Drains the recorded unhandled failures.
    pub fn take_unhandled(&self) -> Vec<Error> {
        std::mem::take(&mut self.core.state.borrow_mut().unhandled)
    }

    /// The loop's configuration.
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.core.config
    }

    pub(crate) fn clock(&self) -> &C {
        &self.core.clock
    }
}

impl<C: TimeSource + 'static> fmt::Debug for EventLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.core.state.borrow();
        f.debug_struct("EventLoop")
            .field("now", &self.core.clock.now())
            .field("microtasks", &st.microtasks.len())
            .field("immediates", &st.immediates.len())
            .field("timers", &st.callbacks.len())
            .field("unhandled", &st.unhandled.len())
            .finish()
    }
}
