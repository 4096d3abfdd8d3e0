//! Delay and polling promises.

use crate::promise::Promise;
use crate::runtime::Engine;
use std::convert::Infallible;
use std::time::Duration;

/// Succeeds once `predicate` returns true.
///
/// The predicate is evaluated on the promise's worker, first immediately and
/// then once per configured poll interval. Cancellation or shutdown stops
/// the polling and cancels the promise.
pub fn wait_until<P>(engine: &Engine, mut predicate: P) -> Promise<()>
where
    P: FnMut() -> bool + Send + 'static,
{
    let interval = engine.config().poll_interval();
    let timers = engine.clone();
    engine.wrap_with(move |_| async move {
        while !predicate() {
            timers.sleep(interval).await;
        }
        Ok::<(), Infallible>(())
    })
}

/// Succeeds after `seconds`, or is canceled if its token fires first.
///
/// Negative and NaN values are treated as zero; values too large for a
/// [`Duration`] wait practically forever.
pub fn wait_for_seconds(engine: &Engine, seconds: f64) -> Promise<()> {
    let seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
    let duration = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
    wait_for(engine, duration)
}

/// Succeeds after `duration`, or is canceled if its token fires first.
pub fn wait_for(engine: &Engine, duration: Duration) -> Promise<()> {
    let timers = engine.clone();
    engine.wrap_with(move |_| async move {
        timers.sleep(duration).await;
        Ok::<(), Infallible>(())
    })
}
