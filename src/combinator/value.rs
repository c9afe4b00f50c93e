//! Value shaping: `put`, `modify`, `unpack` and `fail`.
//!
//! All four only touch successful outcomes. A failure passes through
//! unchanged.

use super::pipe::Step;
use crate::block::{Block, IntoBlock};
use crate::error::Error;

impl<T: 'static> Block<T> {
    /// Replaces a successful value with `value`.
    pub fn put<U: 'static>(self, value: U) -> Block<U> {
        self.pipe_parts(Step::forward(move |_| Ok(value)), Step::forward(Err), None)
    }

    /// Transforms a successful value.
    ///
    /// Unlike [`then`](Self::then), `func` returns a plain value and is not
    /// normalized.
    pub fn modify<U: 'static>(self, func: impl FnOnce(T) -> U + 'static) -> Block<U> {
        self.pipe_parts(
            Step::forward(move |value| Ok(func(value))),
            Step::forward(Err),
            None,
        )
    }

    /// Turns a successful value into a failure.
    pub fn fail<U: 'static>(self, reason: impl Into<Error>) -> Block<U> {
        let reason = reason.into();
        self.pipe_parts(
            Step::forward(move |_| Err(reason)),
            Step::forward(Err),
            None,
        )
    }
}

macro_rules! unpack_tuple {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: 'static),+> Block<($($ty,)+)> {
            /// Spreads the tuple into `func`'s arguments.
            pub fn unpack<U, F, R>(self, func: F) -> Block<U>
            where
                U: 'static,
                F: FnOnce($($ty),+) -> R + 'static,
                R: IntoBlock<U>,
            {
                self.then(move |($($var,)+)| func($($var),+))
            }
        }
    };
}

unpack_tuple!(T1 a);
unpack_tuple!(T1 a, T2 b);
unpack_tuple!(T1 a, T2 b, T3 c);
unpack_tuple!(T1 a, T2 b, T3 c, T4 d);
unpack_tuple!(T1 a, T2 b, T3 c, T4 d, T5 e);
unpack_tuple!(T1 a, T2 b, T3 c, T4 d, T5 e, T6 f);
