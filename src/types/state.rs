//! Observable Block state.

use core::fmt;

/// The externally visible lifecycle state of a Block.
///
/// Transitions are monotonic: `Running` moves to `Success` or `Error`, and any
/// state may move to `Aborted`. Nothing ever moves back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// No outcome has been delivered yet.
    Running,
    /// Settled with a value.
    Success,
    /// Settled with a failure.
    Error,
    /// Cancelled.
    Aborted,
}

impl BlockState {
    /// Returns true once an outcome has been delivered or the Block was aborted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
