//! Phased dispatch of deferred callbacks to consumer threads.

pub mod dispatcher;
pub mod queue;

pub use dispatcher::Dispatcher;
pub use queue::{Action, PhaseQueue};
