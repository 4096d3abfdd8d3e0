//! Combinators over promises.
//!
//! This module provides:
//!
//! - [`when_all`]: settle once every member settles, classifying the
//!   combined outcome
//! - [`wait_until`]: succeed once a predicate holds, polling on a fixed
//!   interval
//! - [`wait_for_seconds`] / [`wait_for`]: succeed after a delay
//! - [`run`] / [`try_run`]: run a blocking closure on a worker
//!
//! Each is also available as a method on [`Engine`](crate::Engine).

pub mod run;
pub mod wait;
pub mod when_all;

pub use run::{run, try_run};
pub use wait::{wait_for, wait_for_seconds, wait_until};
pub use when_all::{classify, when_all};
