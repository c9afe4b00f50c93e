//! Logging facade used throughout abb.
//!
//! - **With `tracing-integration`** (default): re-exports the `tracing` macros.
//! - **Without it**: the same macro names expand to nothing.
//!
//! Internal modules always import from here rather than from `tracing`
//! directly, so disabling the feature removes every log statement.
//!
//! ```rust,ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! trace!(block = %id, "settled");
//! debug!(kind = ?kind, "scheduler selected");
//! ```

#[cfg(feature = "tracing-integration")]
pub(crate) use tracing::{debug, error, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! Macros that swallow their arguments.

    /// No-op trace-level logging macro.
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub(crate) use {debug, error, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub(crate) use noop::{debug, error, trace, warn};
