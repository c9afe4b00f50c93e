//! Core types shared across abb.
//!
//! - [`id`]: identifiers and logical time (`BlockId`, `Time`)
//! - [`state`]: the externally observable Block state

pub mod id;
pub mod state;

pub use id::{BlockId, Time};
pub use state::BlockState;
