//! Error types and error handling strategy for abb.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (a kind plus optional name, message and source)
//! - Usage errors (programmer misuse) are reported synchronously at the call site
//! - Domain failures travel through the composition graph as a Block's failure value
//! - Panics inside handlers are isolated and converted to [`ErrorKind::Panicked`]
//!
//! # Error Categories
//!
//! - **Usage**: misuse of the Block primitives (double tie, abort after tie, ...)
//! - **Domain**: failures produced by user code or by combinators (timeouts, retry exhaustion)
//! - **Host**: the host environment could not provide a primitive
//! - **Internal**: invariant violations inside abb itself

use core::fmt;
use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Usage ===
    /// A successor was already registered on the Block.
    AlreadyTied,
    /// The Block was already aborted.
    AlreadyAborted,
    /// `abort()` was called on a Block whose successor is set.
    SuccessorSet,
    /// The value cannot be adopted as a Block.
    CannotWrap,

    // === Domain ===
    /// User-provided failure.
    User,
    /// A `timeout` deadline elapsed.
    TimedOut,
    /// `retry` ran out of attempts.
    RetryLimitReached,
    /// A handler panicked.
    Panicked,

    // === Host ===
    /// No host is entered on the current thread.
    HostUnavailable,

    // === Internal ===
    /// Internal error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyTied | Self::AlreadyAborted | Self::SuccessorSet | Self::CannotWrap => {
                ErrorCategory::Usage
            }
            Self::User | Self::TimedOut | Self::RetryLimitReached | Self::Panicked => {
                ErrorCategory::Domain
            }
            Self::HostUnavailable => ErrorCategory::Host,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable name of this kind, used as the default error name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyTied => "AlreadyTied",
            Self::AlreadyAborted => "AlreadyAborted",
            Self::SuccessorSet => "SuccessorSet",
            Self::CannotWrap => "CannotWrap",
            Self::User => "Error",
            Self::TimedOut => "TimedOut",
            Self::RetryLimitReached => "RetryLimitReached",
            Self::Panicked => "Panicked",
            Self::HostUnavailable => "HostUnavailable",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// High-level error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Programmer misuse of the Block primitives.
    Usage,
    /// Failures carried through the composition graph.
    Domain,
    /// Host primitive failures.
    Host,
    /// Internal errors.
    Internal,
}

/// The main error type for abb operations.
///
/// Cloning is cheap: the optional source is shared behind an [`Arc`].
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    name: Option<Cow<'static, str>>,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            name: None,
            message: None,
            source: None,
        }
    }

    /// Creates a user failure with a message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Creates a user failure with an explicit name, for name-based guards.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>, msg: impl Into<String>) -> Self {
        Self::user(msg).with_name(name)
    }

    /// Wraps an arbitrary error value as a user failure.
    ///
    /// The wrapped value stays reachable through [`std::error::Error::source`]
    /// and can be matched by type with [`Guard::of`](crate::combinator::Guard::of).
    #[must_use]
    pub fn from_err(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        let msg = err.to_string();
        Self::user(msg).with_source(err)
    }

    /// Creates an error describing a caught panic payload.
    #[must_use]
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(ErrorKind::Panicked).with_message(msg)
    }

    /// Creates a usage error.
    #[must_use]
    pub fn usage(kind: ErrorKind, msg: impl Into<String>) -> Self {
        debug_assert!(matches!(kind.category(), ErrorCategory::Usage));
        Self::new(kind).with_message(msg)
    }

    /// Creates the failure delivered by `timeout`.
    #[must_use]
    pub fn timed_out() -> Self {
        Self::new(ErrorKind::TimedOut).with_message("timed out")
    }

    /// Creates the failure delivered when `retry` gives up, keeping the last
    /// attempt's failure as the source.
    #[must_use]
    pub fn retry_limit(last: Self) -> Self {
        Self::new(ErrorKind::RetryLimitReached)
            .with_message("retry limit reached")
            .with_source(last)
    }

    /// Creates the failure delivered when no host is entered.
    #[must_use]
    pub fn host_unavailable(primitive: &str) -> Self {
        Self::new(ErrorKind::HostUnavailable)
            .with_message(format!("no host entered on this thread to provide {primitive}"))
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the error name: the explicit name if one was set, else the kind name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.kind.as_str())
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the wrapped source, if any.
    #[must_use]
    pub fn source_ref(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Returns true for programmer-misuse errors.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Usage)
    }

    /// Returns true if this is a `timeout` failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::TimedOut)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Sets the error name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::user(msg)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::user(msg)
    }
}

/// A specialized Result type for abb operations.
pub type Result<T> = core::result::Result<T, Error>;
