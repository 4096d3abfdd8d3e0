//! Worker-side completion of a promise.
//!
//! A worker thread runs the computation to completion under
//! `futures_lite::future::block_on`, racing it against the promise's
//! effective token, then settles the promise exactly once.

use super::progress::ProgressReporter;
use super::shared::{Interrupt, Shared, race};
use super::Promise;
use crate::cancel::LinkedToken;
use crate::catch::{ErrorValue, OperationCanceled};
use crate::runtime::Engine;
use crate::tracing_compat::trace;
use crate::types::CancelReason;
use futures_lite::future;
use std::future::Future;
use std::sync::Arc;

/// Creates a promise and starts its computation on a new worker thread.
///
/// `make` runs on the worker. If the engine is already shut down, the
/// promise is canceled without starting a worker.
pub(crate) fn launch<T, E, F, Fut>(engine: &Engine, make: F) -> Promise<T>
where
    T: Send + Sync + 'static,
    E: Into<ErrorValue>,
    F: FnOnce(LinkedToken, ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + 'static,
{
    let id = engine.next_promise_id();
    let phase = engine.config().default_phase;
    let shared = Shared::new(engine.clone(), id, phase);
    engine.stats_ref().created.inc();
    trace!(promise_id = %id, phase = %phase, "promise created");

    if shared.token.is_cancelled() {
        shared.cancel_with(shared.token.reason().unwrap_or_else(CancelReason::shutdown));
        return Promise::from_shared(shared);
    }

    let worker = Arc::clone(&shared);
    let spawned = engine.spawn_worker(id, move || {
        let token = worker.token.clone();
        let reporter = ProgressReporter::for_promise(&worker);
        future::block_on(complete(&worker, async move {
            make(token, reporter).await.map_err(Into::into)
        }));
    });
    if let Err(err) = spawned {
        shared.fail(ErrorValue::new(err));
    }
    Promise::from_shared(shared)
}

/// Runs the computation and settles the promise with its outcome.
async fn complete<T, Fut>(shared: &Arc<Shared<T>>, work: Fut)
where
    T: Send + Sync + 'static,
    Fut: Future<Output = Result<T, ErrorValue>>,
{
    match race(&shared.token, work).await {
        Err(Interrupt::Canceled(reason)) => {
            shared.cancel_with(reason);
        }
        Err(Interrupt::Faulted(err)) if err.is::<OperationCanceled>() => {
            shared.cancel_with(CancelReason::computation());
        }
        Err(Interrupt::Faulted(err)) => {
            shared.fail(err);
        }
        Ok(value) => {
            // A result read after cancellation is discarded.
            if let Some(reason) = shared.token.reason() {
                shared.cancel_with(reason);
                return;
            }
            shared.succeed(value).await;
        }
    }
}
