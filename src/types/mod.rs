//! Core types for the pledge engine.
//!
//! - [`id`]: Identifier types (`PromiseId`, `ListenerId`)
//! - [`cancel`]: Cancellation reason and kind types
//! - [`phase`]: Host frame-loop phases
//! - [`state`]: Promise settlement state
//! - [`progress`]: Progress snapshots

pub mod cancel;
pub mod id;
pub mod phase;
pub mod progress;
pub mod state;

pub use cancel::{CancelKind, CancelReason};
pub use id::{ListenerId, PromiseId};
pub use phase::Phase;
pub use progress::ProgressData;
pub use state::PromiseState;
