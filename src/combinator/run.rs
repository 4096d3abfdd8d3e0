//! Blocking closures as promises.

use crate::catch::ErrorValue;
use crate::promise::Promise;
use crate::runtime::Engine;
use std::convert::Infallible;

/// Runs `work` on a worker thread and succeeds with its return value.
///
/// A panic in `work` faults the promise with a
/// [`Panicked`](crate::catch::Panicked) fault.
pub fn run<T, F>(engine: &Engine, work: F) -> Promise<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    engine.wrap_with(move |_| async move { Ok::<T, Infallible>(work()) })
}

/// Runs a fallible `work` on a worker thread.
pub fn try_run<T, E, F>(engine: &Engine, work: F) -> Promise<T>
where
    T: Send + Sync + 'static,
    E: Into<ErrorValue>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    engine.wrap_with(move |_| async move { work() })
}
