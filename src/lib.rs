//! Pledge: a cancel-aware promise engine with typed error dispatch and
//! phased main-thread callbacks.
//!
//! # Overview
//!
//! A [`Promise`] wraps a computation that runs on a worker thread. Its
//! callbacks never run on that worker: they are queued on one of the host's
//! frame-loop [`Phase`]s and run when the host ticks that phase from its
//! main thread. Faults are routed to the nearest handler registered for the
//! fault's type or one of its ancestors. Cancellation is cooperative and
//! linked to the engine's lifecycle, so shutting the engine down cancels
//! every pending promise.
//!
//! # Core Guarantees
//!
//! - **Settle once**: a promise leaves `Pending` exactly once; late outcomes are discarded
//! - **Ordered callbacks**: success callbacks, then finals, then continuations, in registration order
//! - **Nearest handler wins**: exact type before ancestor before universal
//! - **No callback after dispose**: a disposed promise runs nothing it had queued
//!
//! # Module Structure
//!
//! - [`types`]: Core types (identifiers, phases, states, cancel reasons, progress)
//! - [`cancel`]: Cancellation sources, tokens and linked tokens
//! - [`catch`]: Fault hierarchy and the typed handler registry
//! - [`dispatch`]: Per-phase action queues and the dispatcher
//! - [`awaiter`]: Completion notification shared by awaitable objects
//! - [`promise`]: The promise handle and its worker driver
//! - [`combinator`]: `when_all`, waits and blocking runs
//! - [`lifecycle`]: Quit signal and listeners
//! - [`runtime`]: Engine, configuration and builder
//! - [`time`]: Timer thread and sleep future
//! - [`observability`]: Engine counters
//! - [`error`](mod@error): Error types
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Feature Flags
//!
//! - `tracing-integration`: log through `tracing`. Off by default; without
//!   it every log statement compiles to nothing, including the warning for
//!   an unhandled fault. Unhandled faults are always counted in
//!   [`StatsSnapshot::unhandled`].
//! - `config-file`: load [`EngineConfig`] from TOML
//! - `test-internals`: the `test_utils` helpers (on by default)
//!
//! # Example
//!
//! ```ignore
//! use pledge::{Engine, Phase};
//!
//! let engine = Engine::new();
//! engine
//!     .run(|| 6 * 7)
//!     .then(|v| println!("got {v}"))
//!     .catch(|err| eprintln!("failed: {err}"))
//!     .detach();
//!
//! // host frame loop
//! engine.tick(Phase::Update)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod awaiter;
pub mod cancel;
pub mod catch;
pub mod combinator;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod promise;
pub mod runtime;
pub mod time;
pub mod tracing_compat;
pub mod types;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use awaiter::{Awaiter, Continuation};
pub use cancel::{CancelSource, CancelToken, LinkedToken};
pub use catch::{
    AggregateFault, ErrorHandlerRegistry, ErrorValue, Fault, Message, OperationCanceled, Panicked,
    Resolution,
};
pub use error::{ConfigError, DispatchError, PromiseError, Result};
pub use lifecycle::LifecycleSignal;
pub use observability::StatsSnapshot;
pub use promise::{ProgressReporter, Promise, PromiseFuture};
pub use runtime::{Engine, EngineBuilder, EngineConfig};
pub use time::Sleep;
pub use types::{CancelKind, CancelReason, ListenerId, Phase, ProgressData, PromiseId, PromiseState};
