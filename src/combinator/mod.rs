//! Combinators over Blocks.
//!
//! Every combinator is built only from the Block primitives (tie, settle,
//! abort) and consumes the Blocks it composes:
//!
//! - [`pipe`](mod@pipe): Sequencing with `pipe`, `then`, `or_else` and `exit`
//! - [`value`]: Value shaping with `put`, `modify`, `unpack` and `fail`
//! - [`recover`]: Guarded recovery with `except` and `suppress`
//! - [`map`](mod@map): Element-wise mapping with bounded concurrency
//! - [`join`]: Wait for all inputs, first failure wins
//! - [`race`]: First input to settle wins
//! - [`timeout`](mod@timeout): Delays and deadlines on the host's timers
//! - [`retry`](mod@retry): Re-invocation with optional exponential backoff
//! - [`periodic`](mod@periodic): Non-overlapping invocation on an interval

pub mod join;
pub mod map;
pub mod periodic;
pub mod pipe;
pub mod race;
pub mod recover;
pub mod retry;
pub mod timeout;
pub mod value;

pub use join::all;
pub use periodic::periodic;
pub use race::any;
pub use recover::Guard;
pub use retry::{calculate_delay, retry, retry_n, retry_with, RetryPolicy};
pub use timeout::{timeout, wait};
