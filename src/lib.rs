//! abb: cancellable asynchronous building blocks.
//!
//! # Overview
//!
//! A [`Block`] is a single-fire asynchronous result cell: it settles once
//! with a value or an [`Error`], hands that outcome to at most one
//! successor, and can be aborted while it is still running. Combinators
//! consume Blocks and produce new ones, so a whole computation is a graph
//! of Blocks through which both results and cancellation flow.
//!
//! # Core Guarantees
//!
//! - **Deferred delivery**: successors never run inside the call that settled a Block
//! - **Settlement order**: Blocks fire in the order they settled, with constant stack depth
//! - **Single ownership**: piping moves a Block; cancellation moves with it
//! - **No lost failures**: an untied, dropped failure reaches the host's unhandled channel
//! - **Deterministic testing**: [`LabLoop`] drives every timer on virtual time
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers, time points and Block states
//! - [`block`]: The Block, its constructors and abort handles
//! - [`combinator`]: Sequencing, recovery, fan-in, timers, retry, periodic
//! - [`dispatch`]: The thread-local trampoline that fires settled Blocks
//! - [`runtime`]: The host contract, scheduler selection and the event loop
//! - [`lab`]: Virtual-time event loop for tests
//! - [`time`]: Clock sources
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use abb::{success, LabLoop};
//!
//! let lab = LabLoop::new();
//! let _guard = lab.enter();
//! let doubled = success(12).then(|r: i32| r * 2);
//! lab.run_until_idle();
//! assert_eq!(doubled.state(), abb::BlockState::Success);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod block;
pub mod combinator;
pub mod dispatch;
pub mod error;
pub mod lab;
pub mod runtime;
pub mod time;
mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use block::{
    error, from_block, from_result, from_thenable, implement, success, wrap, AbortHandle, Block,
    Cancel, ErrorTrap, IntoBlock, IntoCancel, Resolver, Thenable,
};
pub use combinator::{
    all, any, periodic, retry, retry_n, retry_with, timeout, wait, Guard, RetryPolicy,
};
pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use lab::LabLoop;
pub use runtime::{
    enter, Capabilities, ConfigError, EnterGuard, EventLoop, Host, LoopConfig, SchedulerKind,
    TimerId, UnhandledResponse,
};
pub use types::{BlockId, BlockState, Time};
