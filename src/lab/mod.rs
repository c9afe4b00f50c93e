//! Deterministic lab host for testing.
//!
//! The lab host provides:
//!
//! - Virtual time (no wall-clock dependencies)
//! - The same queue semantics as [`EventLoop`](crate::runtime::EventLoop)
//! - Recorded unhandled failures for assertions
//!
//! Time moves only when a test calls [`LabLoop::advance`] or
//! [`LabLoop::advance_to_next`], so timer-driven combinators such as
//! `wait`, `timeout`, `retry` backoff and `periodic` run the same way on
//! every execution.

pub mod runtime;

pub use runtime::LabLoop;
