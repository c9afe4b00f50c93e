//! Error trap for abort cascades.
//!
//! Aborting a Block can run arbitrary cancel actions further up the graph,
//! and any of them may fail. The trap collects those failures while the
//! cascade runs. An armed trap (created by a public `abort()`) keeps the
//! first failure and hands it back to the caller. An unarmed trap (used by
//! internal cascades such as fail-fast in `all`) forwards each failure to
//! the host's unhandled-error channel.

use crate::error::{Error, Result};
use crate::runtime;
use crate::tracing_compat::debug;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Debug)]
enum Mode {
    Unarmed,
    Armed { first: Option<Error>, discarded: usize },
}

/// Collects failures raised by cancel actions during one abort cascade.
#[derive(Debug)]
pub struct ErrorTrap {
    mode: Mode,
}

impl ErrorTrap {
    /// A trap that captures the first failure for the caller.
    #[must_use]
    pub fn armed() -> Self {
        Self {
            mode: Mode::Armed {
                first: None,
                discarded: 0,
            },
        }
    }

    /// A trap that reports every failure as unhandled.
    #[must_use]
    pub fn unarmed() -> Self {
        Self {
            mode: Mode::Unarmed,
        }
    }

    /// Returns true if failures are captured rather than reported.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self.mode, Mode::Armed { .. })
    }

    /// Records a failure.
    pub fn record(&mut self, err: Error) {
        match &mut self.mode {
            Mode::Unarmed => runtime::report_unhandled(err),
            Mode::Armed { first, discarded } => {
                if first.is_none() {
                    *first = Some(err);
                } else {
                    *discarded += 1;
                    debug!(error = %err, discarded = *discarded, "abort failure discarded");
                }
            }
        }
    }

    /// Runs a cancel action, recording its `Err` or panic.
    pub fn guard(&mut self, action: impl FnOnce() -> Result<()>) {
        match catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.record(err),
            Err(payload) => self.record(Error::panicked(payload)),
        }
    }

    /// Number of failures dropped after the first one.
    #[must_use]
    pub fn discarded(&self) -> usize {
        match self.mode {
            Mode::Unarmed => 0,
            Mode::Armed { discarded, .. } => discarded,
        }
    }

    /// Ends the cascade, returning the captured failure if any.
    pub fn finish(self) -> Result<()> {
        match self.mode {
            Mode::Armed {
                first: Some(err), ..
            } => Err(err),
            _ => Ok(()),
        }
    }
}
