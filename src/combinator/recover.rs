//! Failure recovery: `except` and `suppress`, optionally guarded.

use super::pipe::Step;
use crate::block::{Block, IntoBlock};
use crate::error::{Error, ErrorKind};
use core::fmt;
use std::borrow::Cow;

/// Selects which failures a recovery combinator handles.
#[derive(Clone, Default)]
pub enum Guard {
    /// Every failure.
    #[default]
    Any,
    /// Failures whose [`Error::name`] equals this name.
    Name(Cow<'static, str>),
    /// Failures of this kind.
    Kind(ErrorKind),
    /// Failures whose source is of a given type. Build with [`Guard::of`].
    Type {
        /// Type name, for diagnostics.
        name: &'static str,
        /// The check.
        check: fn(&Error) -> bool,
    },
    /// Failures matching any of the guards.
    AnyOf(Vec<Guard>),
}

impl Guard {
    /// Matches failures wrapping a source of type `E`.
    #[must_use]
    pub fn of<E: std::error::Error + 'static>() -> Self {
        fn check<E: std::error::Error + 'static>(err: &Error) -> bool {
            err.source_ref().is_some_and(|source| source.is::<E>())
        }
        Self::Type {
            name: std::any::type_name::<E>(),
            check: check::<E>,
        }
    }

    /// Returns true if `err` is selected.
    #[must_use]
    pub fn matches(&self, err: &Error) -> bool {
        match self {
            Self::Any => true,
            Self::Name(name) => err.name() == name.as_ref(),
            Self::Kind(kind) => err.kind() == *kind,
            Self::Type { check, .. } => check(err),
            Self::AnyOf(guards) => guards.iter().any(|g| g.matches(err)),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Type { name, .. } => f.debug_tuple("Type").field(name).finish(),
            Self::AnyOf(guards) => f.debug_tuple("AnyOf").field(guards).finish(),
        }
    }
}

impl From<&'static str> for Guard {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Guard {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

impl From<ErrorKind> for Guard {
    fn from(kind: ErrorKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<Vec<Guard>> for Guard {
    fn from(guards: Vec<Guard>) -> Self {
        Self::AnyOf(guards)
    }
}

impl<T: 'static> Block<T> {
    /// Recovers from any failure with `func`.
    pub fn except<E, RE>(self, func: E) -> Block<T>
    where
        E: FnOnce(Error) -> RE + 'static,
        RE: IntoBlock<T>,
    {
        self.or_else(func)
    }

    /// Recovers from failures selected by `guard`; others pass through.
    pub fn except_when<E, RE>(self, guard: impl Into<Guard>, func: E) -> Block<T>
    where
        E: FnOnce(Error) -> RE + 'static,
        RE: IntoBlock<T>,
    {
        let guard = guard.into();
        self.pipe_parts(
            Step::forward(Ok),
            Step::handler(move |err: Error| {
                if guard.matches(&err) {
                    func(err).into_block()
                } else {
                    Block::settled(Err(err))
                }
            }),
            None,
        )
    }

    /// Replaces any failure with `value`.
    pub fn suppress(self, value: T) -> Block<T> {
        self.suppress_when(Guard::Any, value)
    }

    /// Replaces failures selected by `guard` with `value`.
    pub fn suppress_when(self, guard: impl Into<Guard>, value: T) -> Block<T> {
        let guard = guard.into();
        self.pipe_parts(
            Step::forward(Ok),
            Step::forward(move |err: Error| if guard.matches(&err) { Ok(value) } else { Err(err) }),
            None,
        )
    }
}
