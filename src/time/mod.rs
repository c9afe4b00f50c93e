//! Time sources for the shipped hosts.
//!
//! [`EventLoop`](crate::runtime::EventLoop) is generic over a [`TimeSource`]:
//! production loops read the [`WallClock`], lab loops read a [`VirtualClock`]
//! that moves only when the test advances it.

mod driver;

pub use driver::{TimeSource, VirtualClock, WallClock};
