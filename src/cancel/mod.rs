//! Cooperative cancellation primitives.
//!
//! - [`CancelSource`] / [`CancelToken`]: owner and observer of one signal
//! - [`LinkedToken`]: fires when any linked member fires

pub mod linked;
pub mod token;

pub use linked::{LinkedCancelled, LinkedToken};
pub use token::{CancelSource, CancelToken, Cancelled};
