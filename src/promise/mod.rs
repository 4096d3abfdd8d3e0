//! Promises: a wrapped computation plus chained callbacks.
//!
//! A [`Promise`] is created by one of the [`Engine`] constructors and settles
//! exactly once, as `Succeeded`, `Faulted` or `Canceled`. Callbacks
//! registered while it is pending are queued on the promise's phase when it
//! settles, in the order `then`, `catch`, `finally`, then `on_completed`
//! continuations. Callbacks registered after it settled run immediately on
//! the registering thread.
//!
//! Dropping a pending promise disposes it: its computation is canceled and
//! no further callbacks run. Call [`Promise::detach`] to let it finish
//! without a handle.
//!
//! ```ignore
//! let engine = Engine::new();
//! let answer = engine
//!     .wrap(async { Ok::<_, ErrorValue>(42) })
//!     .then(|value| println!("got {value}"))
//!     .catch(|err| eprintln!("failed: {err}"))
//!     .finally(|| println!("done"));
//! // host loop
//! engine.tick(Phase::Initialization)?;
//! ```

mod driver;
mod future;
mod progress;
mod shared;

pub(crate) use driver::launch;
pub use future::PromiseFuture;
pub use progress::ProgressReporter;

use crate::awaiter::{Awaiter, Continuation};
use crate::cancel::LinkedToken;
use crate::catch::{ErrorValue, Fault};
use crate::error::{PromiseError, Result};
use crate::runtime::Engine;
use crate::types::{CancelReason, Phase, ProgressData, PromiseId, PromiseState};
use shared::{Shared, StepFuture};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

/// Handle to an asynchronous computation and its callback chain.
///
/// Chaining methods take and return the handle, so registrations read as one
/// expression. The handle is not `Clone`: it is the single owner of the
/// promise's lifetime.
#[must_use = "dropping a pending promise cancels it; call `detach()` to let it run"]
pub struct Promise<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
    armed: bool,
}

impl<T: Send + Sync + 'static> Promise<T> {
    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    /// Returns the promise's identifier.
    #[must_use]
    pub fn id(&self) -> PromiseId {
        self.shared.id
    }

    /// Returns the engine the promise belongs to.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.shared.engine
    }

    /// Current settlement state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        self.shared.state()
    }

    /// Returns true once the promise has settled.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns true if the promise was canceled or disposed.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state() == PromiseState::Canceled
    }

    /// Returns true once the promise has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Returns the phase callbacks are delivered on.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Returns the promise's effective token: its own cancellation or the
    /// engine's shutdown, whichever comes first.
    #[must_use]
    pub fn token(&self) -> LinkedToken {
        self.shared.token.clone()
    }

    /// Delivers this promise's callbacks on `phase` instead of the engine
    /// default.
    pub fn on_phase(self, phase: Phase) -> Self {
        self.shared.set_phase(phase);
        self
    }

    /// Registers a success callback.
    ///
    /// Queued on the promise's phase when it succeeds; run immediately if it
    /// already has. Never runs if the promise faults, is canceled or is
    /// disposed.
    pub fn then<F>(self, on_success: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.shared.add_success(Box::new(on_success));
        self
    }

    /// Registers an asynchronous step that runs after the computation
    /// succeeds and before the promise settles.
    ///
    /// Steps run in registration order on the promise's worker, never on a
    /// consumer thread. A failing step settles the promise as faulted.
    /// Registered after success, the step runs detached on a new worker and
    /// its failure is only logged.
    pub fn then_async<F, Fut, E>(self, step: F) -> Self
    where
        F: FnOnce(&T) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + 'static,
        E: Into<ErrorValue>,
    {
        self.shared.add_step(Box::new(move |value: &T| -> StepFuture {
            let fut = step(value);
            Box::pin(async move { fut.await.map_err(Into::into) })
        }));
        self
    }

    /// Registers a handler for any fault.
    ///
    /// Only runs if no typed handler on the fault's chain is registered.
    /// Registered after the promise faulted, it runs immediately unless a
    /// typed handler already took the fault.
    pub fn catch<F>(self, on_error: F) -> Self
    where
        F: FnOnce(&ErrorValue) + Send + 'static,
    {
        self.shared.add_catch_any(on_error);
        self
    }

    /// Registers a handler for faults that are, or descend from, `E`.
    ///
    /// When the promise faults, handlers for the fault's most specific
    /// registered type run; others do not. Registered after the promise
    /// faulted with a matching fault, it runs immediately unless a handler
    /// for a more specific type already took the fault.
    pub fn catch_kind<E: Fault>(self, on_error: impl FnOnce(&E) + Send + 'static) -> Self {
        self.shared.add_catch::<E, _>(on_error);
        self
    }

    /// Registers a callback that runs once after the promise settles,
    /// whatever the outcome.
    ///
    /// Cancellation drops pending finally callbacks; one registered after
    /// the promise settled, canceled included, runs immediately.
    pub fn finally<F>(self, on_final: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.add_final(Box::new(on_final));
        self
    }

    /// Registers a progress callback, fed by the computation's
    /// [`ProgressReporter`].
    pub fn progress<F>(self, on_progress: F) -> Self
    where
        F: FnMut(ProgressData) + Send + 'static,
    {
        self.shared.add_progress(Box::new(on_progress));
        self
    }

    /// Registers a continuation that runs once the promise settles.
    ///
    /// Runs immediately if the promise already settled; does nothing if it
    /// was disposed.
    pub fn on_completed<F>(&self, continuation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.add_continuation(Box::new(continuation));
    }

    /// Cancels the promise if it has not settled.
    ///
    /// Pending callbacks are dropped and the computation's token fires.
    /// Calling it again does nothing.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Cancels the promise and releases its handlers. Queued callbacks that
    /// have not yet run are skipped. Calling it again does nothing.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// Lets the promise run to completion without a handle.
    pub fn detach(mut self) {
        self.armed = false;
    }

    /// Returns the result if the promise succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.shared.value()
    }

    /// Returns the fault if the promise faulted.
    #[must_use]
    pub fn error(&self) -> Option<ErrorValue> {
        self.shared.fault().cloned()
    }

    /// Returns the fault last routed to the handlers registered for exactly
    /// `E`.
    #[must_use]
    pub fn get_error<E: Fault>(&self) -> Option<ErrorValue> {
        self.shared.get_error::<E>()
    }

    /// Returns why the promise was canceled.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.shared.cancel_reason()
    }

    fn outcome_with<R>(&self, read: impl FnOnce(&T) -> R) -> Result<R> {
        match self.state() {
            PromiseState::Pending => Err(PromiseError::NotReady),
            PromiseState::Succeeded => self.value().map(read).ok_or(PromiseError::NotReady),
            PromiseState::Faulted => Err(self
                .error()
                .map_or(PromiseError::NotReady, PromiseError::Faulted)),
            PromiseState::Canceled => Err(PromiseError::Canceled(
                self.cancel_reason().unwrap_or_default(),
            )),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Promise<T> {
    /// Returns the outcome: the result, or why there is none.
    ///
    /// Before settlement this is [`PromiseError::NotReady`].
    pub fn get_result(&self) -> Result<T> {
        self.outcome_with(T::clone)
    }
}

impl<T: Send + Sync + 'static> Awaiter for Promise<T> {
    fn state(&self) -> PromiseState {
        self.shared.state()
    }

    fn on_completed(&self, continuation: Continuation) {
        self.shared.add_continuation(continuation);
    }
}

impl<T: Clone + Send + Sync + 'static> IntoFuture for Promise<T> {
    type Output = Result<T>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        PromiseFuture::new(self)
    }
}

impl<T: Send + Sync + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.armed && !self.shared.state().is_terminal() {
            self.shared.dispose();
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("phase", &self.phase())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch::fault::tests::{ScriptError, TypeError, type_error};
    use crate::catch::{OperationCanceled, Panicked};
    use crate::test_utils::{DEFAULT_TEST_TIMEOUT, init_test_logging, pump_until, tick_all};
    use crate::types::CancelKind;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn push(log: &Log, entry: &'static str) -> impl FnOnce() + Send + 'static {
        let log = Arc::clone(log);
        move || log.lock().push(entry)
    }

    /// A promise whose computation finishes with `value` once `open` is set.
    fn gated(engine: &Engine, open: &Arc<AtomicBool>, value: u32) -> Promise<u32> {
        let open = Arc::clone(open);
        let timers = engine.clone();
        engine.wrap(async move {
            while !open.load(Ordering::SeqCst) {
                timers.sleep(Duration::from_millis(1)).await;
            }
            Ok::<u32, ErrorValue>(value)
        })
    }

    #[test]
    fn success_runs_then_final_and_continuation_in_order() {
        init_test("success_runs_then_final_and_continuation_in_order");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let open = Arc::new(AtomicBool::new(false));
        let value = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&value);
        let then_log = Arc::clone(&log);
        let promise = gated(&engine, &open, 42)
            .then(move |v| {
                *seen.lock() = Some(*v);
                then_log.lock().push("then");
            })
            .finally(push(&log, "final"));
        promise.on_completed(push(&log, "continuation"));
        open.store(true, Ordering::SeqCst);

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || log.lock().len() == 3));
        assert_eq!(*log.lock(), vec!["then", "final", "continuation"]);
        assert_eq!(*value.lock(), Some(42));
        assert_eq!(promise.state(), PromiseState::Succeeded);
        assert_eq!(promise.get_result().unwrap(), 42);
        engine.shutdown();
        crate::test_complete!("success_runs_then_final_and_continuation_in_order");
    }

    #[test]
    fn late_registration_runs_immediately() {
        init_test("late_registration_runs_immediately");
        let engine = Engine::new();
        let promise = engine.run(|| 7_u32);
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || promise.is_completed()));

        let log: Log = Arc::default();
        let then_log = Arc::clone(&log);
        let promise = promise
            .then(move |_| then_log.lock().push("then"))
            .catch(|_| panic!("catch on a succeeded promise"))
            .finally(push(&log, "final"));
        promise.on_completed(push(&log, "continuation"));
        assert_eq!(*log.lock(), vec!["then", "final", "continuation"]);
        engine.shutdown();
        crate::test_complete!("late_registration_runs_immediately");
    }

    #[test]
    fn cancel_before_finish_drops_callbacks() {
        init_test("cancel_before_finish_drops_callbacks");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let open = Arc::new(AtomicBool::new(false));
        let then_log = Arc::clone(&log);
        let promise = gated(&engine, &open, 1)
            .then(move |_| then_log.lock().push("then"))
            .finally(push(&log, "final"));
        let token = promise.token();

        promise.cancel();
        promise.cancel();
        open.store(true, Ordering::SeqCst);

        assert!(promise.is_canceled());
        assert!(promise.is_completed());
        assert!(token.is_cancelled());
        let reason = promise.cancel_reason().unwrap();
        assert_eq!(reason.kind, CancelKind::User);
        assert!(matches!(promise.get_result(), Err(PromiseError::Canceled(_))));

        thread_settle(&engine);
        assert!(log.lock().is_empty());
        assert_eq!(engine.stats().canceled, 1);
        assert_eq!(engine.stats().succeeded, 0);
        engine.shutdown();
        crate::test_complete!("cancel_before_finish_drops_callbacks");
    }

    /// Awaits `promise` on its own thread while this thread ticks the phases.
    fn await_while_pumping<T>(engine: &Engine, promise: Promise<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let waiter = thread::spawn(move || futures_lite::future::block_on(promise.into_future()));
        assert!(pump_until(engine, DEFAULT_TEST_TIMEOUT, || waiter.is_finished()));
        waiter.join().unwrap()
    }

    /// Blocks until `done` holds, without ticking any phase.
    fn wait_until_true(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + DEFAULT_TEST_TIMEOUT;
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Gives the worker time to observe the outcome, then drains every phase.
    fn thread_settle(engine: &Engine) {
        thread::sleep(Duration::from_millis(20));
        tick_all(engine).unwrap();
    }

    #[test]
    fn cancellation_wins_over_computation_that_ignores_its_token() {
        init_test("cancellation_wins_over_computation_that_ignores_its_token");
        let engine = Engine::new();
        let timers = engine.clone();
        let promise = engine.wrap(async move {
            timers.sleep(Duration::from_secs(60)).await;
            Ok::<u32, ErrorValue>(1)
        });
        promise.cancel();
        assert!(promise.is_canceled());
        assert!(promise.value().is_none());
        engine.shutdown();
        crate::test_complete!("cancellation_wins_over_computation_that_ignores_its_token");
    }

    #[test]
    fn fault_reaches_nearest_ancestor_handler() {
        init_test("fault_reaches_nearest_ancestor_handler");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let script_log = Arc::clone(&log);
        let promise = engine
            .wrap(async { Err::<u32, _>(type_error("bad")) })
            .catch_kind::<ScriptError>(move |err| {
                assert_eq!(err.0, "bad");
                script_log.lock().push("script");
            })
            .catch(|_| panic!("universal handler ran"));

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || !log.lock().is_empty()));
        tick_all(&engine).unwrap();
        assert_eq!(*log.lock(), vec!["script"]);
        assert_eq!(promise.state(), PromiseState::Faulted);
        assert!(promise.error().unwrap().is::<TypeError>());
        assert!(promise.get_error::<ScriptError>().is_some());
        assert!(promise.get_error::<TypeError>().is_none());
        engine.shutdown();
        crate::test_complete!("fault_reaches_nearest_ancestor_handler");
    }

    #[test]
    fn exact_handler_shadows_ancestor() {
        init_test("exact_handler_shadows_ancestor");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let exact = Arc::clone(&log);
        let _promise = engine
            .wrap(async { Err::<u32, _>(type_error("bad")) })
            .catch_kind::<ScriptError>(|_| panic!("ancestor handler ran"))
            .catch_kind::<TypeError>(move |_| exact.lock().push("type"));

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || !log.lock().is_empty()));
        tick_all(&engine).unwrap();
        assert_eq!(*log.lock(), vec!["type"]);
        engine.shutdown();
        crate::test_complete!("exact_handler_shadows_ancestor");
    }

    #[test]
    fn unmatched_fault_falls_back_to_universal_handler() {
        init_test("unmatched_fault_falls_back_to_universal_handler");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let any = Arc::clone(&log);
        let _promise = engine
            .wrap(async { Err::<u32, _>(ErrorValue::msg("plain")) })
            .catch_kind::<ScriptError>(|_| panic!("typed handler ran"))
            .catch(move |err| {
                assert_eq!(err.to_string(), "plain");
                any.lock().push("universal");
            });

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || !log.lock().is_empty()));
        let stats = engine.stats();
        assert_eq!(stats.faulted, 1);
        assert_eq!(stats.unhandled, 0);
        engine.shutdown();
        crate::test_complete!("unmatched_fault_falls_back_to_universal_handler");
    }

    #[test]
    fn unhandled_fault_is_counted() {
        init_test("unhandled_fault_is_counted");
        let engine = Engine::new();
        let promise = engine.wrap(async { Err::<u32, _>(ErrorValue::msg("nobody listens")) });
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || promise.is_completed()));
        assert_eq!(engine.stats().unhandled, 1);
        engine.shutdown();
        crate::test_complete!("unhandled_fault_is_counted");
    }

    #[test]
    fn panic_in_computation_faults_with_panicked() {
        init_test("panic_in_computation_faults_with_panicked");
        let engine = Engine::new();
        let promise = engine.run(|| -> u32 { panic!("worker blew up") });
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || promise.is_completed()));
        let err = promise.error().unwrap();
        let panicked = err.find::<Panicked>().unwrap();
        assert_eq!(panicked.message, "worker blew up");
        engine.shutdown();
        crate::test_complete!("panic_in_computation_faults_with_panicked");
    }

    #[test]
    fn operation_canceled_error_cancels() {
        init_test("operation_canceled_error_cancels");
        let engine = Engine::new();
        let promise = engine.wrap(async { Err::<u32, _>(OperationCanceled) });
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || promise.is_completed()));
        assert!(promise.is_canceled());
        assert_eq!(promise.cancel_reason().unwrap().kind, CancelKind::Computation);
        assert!(promise.error().is_none());
        engine.shutdown();
        crate::test_complete!("operation_canceled_error_cancels");
    }

    #[test]
    fn failing_step_faults_the_promise() {
        init_test("failing_step_faults_the_promise");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let open = Arc::new(AtomicBool::new(false));
        let caught = Arc::clone(&log);
        let promise = gated(&engine, &open, 3)
            .then_async(|v| {
                let v = *v;
                async move {
                    if v == 3 {
                        Err(ErrorValue::msg("step refused"))
                    } else {
                        Ok(())
                    }
                }
            })
            .then(|_| panic!("then after failed step"))
            .catch(move |err| {
                assert_eq!(err.to_string(), "step refused");
                caught.lock().push("catch");
            });
        open.store(true, Ordering::SeqCst);

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || !log.lock().is_empty()));
        assert_eq!(promise.state(), PromiseState::Faulted);
        engine.shutdown();
        crate::test_complete!("failing_step_faults_the_promise");
    }

    #[test]
    fn dropping_pending_promise_disposes_it() {
        init_test("dropping_pending_promise_disposes_it");
        let engine = Engine::new();
        let open = Arc::new(AtomicBool::new(false));
        let promise = gated(&engine, &open, 1).then(|_| panic!("disposed promise ran then"));
        let token = promise.token();
        drop(promise);

        assert!(token.is_cancelled());
        assert_eq!(token.reason().unwrap().kind, CancelKind::Disposed);
        open.store(true, Ordering::SeqCst);
        thread_settle(&engine);
        engine.shutdown();
        crate::test_complete!("dropping_pending_promise_disposes_it");
    }

    #[test]
    fn dispose_skips_already_queued_callbacks() {
        init_test("dispose_skips_already_queued_callbacks");
        let engine = Engine::new();
        let promise = engine.run(|| 5_u32).then(|_| panic!("queued then ran after dispose"));
        let phase = promise.phase();
        wait_until_true(|| engine.pending(phase) > 0);
        assert!(promise.is_completed());
        assert_eq!(engine.pending(phase), 1);
        promise.dispose();
        promise.dispose();
        assert!(promise.is_disposed());
        tick_all(&engine).unwrap();
        assert_eq!(promise.state(), PromiseState::Succeeded);
        engine.shutdown();
        crate::test_complete!("dispose_skips_already_queued_callbacks");
    }

    #[test]
    fn detached_promise_runs_to_completion() {
        init_test("detached_promise_runs_to_completion");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let then_log = Arc::clone(&log);
        engine
            .run(|| 9_u32)
            .then(move |v| {
                assert_eq!(*v, 9);
                then_log.lock().push("then");
            })
            .detach();
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || !log.lock().is_empty()));
        engine.shutdown();
        crate::test_complete!("detached_promise_runs_to_completion");
    }

    #[test]
    fn progress_reports_reach_callbacks() {
        init_test("progress_reports_reach_callbacks");
        let engine = Engine::new();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let open = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&open);
        let timers = engine.clone();
        let sink = Arc::clone(&reports);
        let promise = engine
            .wrap_with_progress(move |_, reporter| async move {
                while !gate.load(Ordering::SeqCst) {
                    timers.sleep(Duration::from_millis(1)).await;
                }
                reporter.update(4, 1);
                reporter.update(4, 3);
                reporter.finish(4);
                Ok::<(), ErrorValue>(())
            })
            .progress(move |data| sink.lock().push(data));
        open.store(true, Ordering::SeqCst);

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || reports.lock().len() == 3));
        {
            let reports = reports.lock();
            assert_eq!(reports[0], ProgressData::new(4, 1));
            assert!(reports[2].done);
        }
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || promise.is_completed()));
        engine.shutdown();
        crate::test_complete!("progress_reports_reach_callbacks");
    }

    #[test]
    fn awaiting_a_promise_yields_its_result() {
        init_test("awaiting_a_promise_yields_its_result");
        let engine = Engine::new();
        let value = await_while_pumping(&engine, engine.run(|| 11_u32));
        assert_eq!(value.unwrap(), 11);

        let failed = await_while_pumping(
            &engine,
            engine.wrap(async { Err::<u32, _>(ErrorValue::msg("nope")) }),
        );
        assert!(matches!(failed, Err(PromiseError::Faulted(_))));

        // Already settled: resolves on the first poll, no tick needed.
        let settled = engine.run(|| 12_u32);
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || settled.is_completed()));
        assert_eq!(futures_lite::future::block_on(settled.into_future()).unwrap(), 12);
        engine.shutdown();
        crate::test_complete!("awaiting_a_promise_yields_its_result");
    }

    #[test]
    fn shutdown_cancels_pending_promises() {
        init_test("shutdown_cancels_pending_promises");
        let engine = Engine::new();
        let open = Arc::new(AtomicBool::new(false));
        let promise = gated(&engine, &open, 1);
        assert!(!promise.is_completed());
        engine.shutdown();

        wait_until_true(|| promise.is_completed());
        assert!(promise.is_canceled());
        assert!(promise.cancel_reason().unwrap().is_shutdown());

        let late = engine.run(|| 1_u32);
        assert!(late.is_canceled());
        crate::test_complete!("shutdown_cancels_pending_promises");
    }

    #[test]
    fn await_resumes_after_then_callbacks() {
        init_test("await_resumes_after_then_callbacks");
        let engine = Engine::new();
        let open = Arc::new(AtomicBool::new(false));
        let then_ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&then_ran);
        let promise = gated(&engine, &open, 5).then(move |_| flag.store(true, Ordering::SeqCst));
        let shared = Arc::clone(&promise.shared);

        let seen = Arc::clone(&then_ran);
        let waiter = thread::spawn(move || {
            let outcome = futures_lite::future::block_on(promise.into_future());
            (outcome, seen.load(Ordering::SeqCst))
        });
        wait_until_true(|| shared.core.waiting_tasks() == 1);
        assert_eq!(shared.core.waiting_tasks(), 1);
        open.store(true, Ordering::SeqCst);

        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || waiter.is_finished()));
        let (outcome, ran_first) = waiter.join().unwrap();
        assert_eq!(outcome.unwrap(), 5);
        crate::assert_with_log!(ran_first, "then ran before the await resumed", true, ran_first);
        engine.shutdown();
        crate::test_complete!("await_resumes_after_then_callbacks");
    }

    #[test]
    fn canceled_promise_wakes_awaiter_without_a_tick() {
        init_test("canceled_promise_wakes_awaiter_without_a_tick");
        let engine = Engine::new();
        let open = Arc::new(AtomicBool::new(false));
        let promise = gated(&engine, &open, 1);
        let shared = Arc::clone(&promise.shared);
        let waiter = thread::spawn(move || futures_lite::future::block_on(promise.into_future()));
        wait_until_true(|| shared.core.waiting_tasks() == 1);

        shared.cancel();
        let outcome = waiter.join().unwrap();
        assert!(matches!(outcome, Err(PromiseError::Canceled(_))));
        engine.shutdown();
        crate::test_complete!("canceled_promise_wakes_awaiter_without_a_tick");
    }

    #[test]
    fn result_read_after_shutdown_is_discarded() {
        init_test("result_read_after_shutdown_is_discarded");
        let engine = Engine::new();
        let lifecycle = engine.clone();
        let promise = engine
            .wrap(async move {
                lifecycle.shutdown();
                Ok::<u32, ErrorValue>(42)
            })
            .then(|_| panic!("then ran for a discarded result"));

        wait_until_true(|| promise.is_completed());
        assert!(promise.is_canceled());
        assert!(promise.cancel_reason().unwrap().is_shutdown());
        assert!(promise.value().is_none());
        assert!(matches!(promise.get_result(), Err(PromiseError::Canceled(_))));
        assert_eq!(engine.stats().succeeded, 0);
        crate::test_complete!("result_read_after_shutdown_is_discarded");
    }

    #[test]
    fn late_catch_skips_fault_taken_by_typed_handler() {
        init_test("late_catch_skips_fault_taken_by_typed_handler");
        let engine = Engine::new();
        let log: Log = Arc::default();
        let exact = Arc::clone(&log);
        let promise = engine
            .wrap(async { Err::<u32, _>(type_error("bad")) })
            .catch_kind::<TypeError>(move |_| exact.lock().push("type"));
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || !log.lock().is_empty()));

        let late_exact = Arc::clone(&log);
        let promise = promise
            .catch(|_| panic!("late universal handler ran"))
            .catch_kind::<ScriptError>(|_| panic!("late ancestor handler ran"))
            .catch_kind::<TypeError>(move |_| late_exact.lock().push("late type"));
        assert_eq!(*log.lock(), vec!["type", "late type"]);
        assert!(promise.get_error::<ScriptError>().is_none());
        engine.shutdown();
        crate::test_complete!("late_catch_skips_fault_taken_by_typed_handler");
    }

    #[test]
    fn late_catch_runs_when_no_typed_handler_took_the_fault() {
        init_test("late_catch_runs_when_no_typed_handler_took_the_fault");
        let engine = Engine::new();
        let promise = engine.wrap(async { Err::<u32, _>(type_error("bad")) });
        assert!(pump_until(&engine, DEFAULT_TEST_TIMEOUT, || promise.is_completed()));

        let log: Log = Arc::default();
        let any = Arc::clone(&log);
        let ancestor = Arc::clone(&log);
        let _promise = promise
            .catch(move |_| any.lock().push("universal"))
            .catch_kind::<ScriptError>(move |_| ancestor.lock().push("script"))
            .catch(|_| panic!("universal after a typed handler took the fault"));
        assert_eq!(*log.lock(), vec!["universal", "script"]);
        engine.shutdown();
        crate::test_complete!("late_catch_runs_when_no_typed_handler_took_the_fault");
    }

    #[test]
    fn operation_canceled_from_step_cancels() {
        init_test("operation_canceled_from_step_cancels");
        let engine = Engine::new();
        let open = Arc::new(AtomicBool::new(false));
        let promise = gated(&engine, &open, 1)
            .then_async(|_| async { Err::<(), _>(OperationCanceled) })
            .then(|_| panic!("then after a canceled step"))
            .catch(|_| panic!("catch after a canceled step"));
        open.store(true, Ordering::SeqCst);

        wait_until_true(|| promise.is_completed());
        assert!(promise.is_canceled());
        assert_eq!(promise.cancel_reason().unwrap().kind, CancelKind::Computation);
        assert!(promise.error().is_none());
        thread_settle(&engine);
        assert_eq!(engine.stats().faulted, 0);
        engine.shutdown();
        crate::test_complete!("operation_canceled_from_step_cancels");
    }

    #[test]
    fn continuation_racing_dispose_never_runs() {
        init_test("continuation_racing_dispose_never_runs");
        let engine = Engine::new();
        let open = Arc::new(AtomicBool::new(false));
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let promise = gated(&engine, &open, 1);
            thread::scope(|scope| {
                scope.spawn(|| promise.dispose());
                let ran = Arc::clone(&ran);
                promise.on_completed(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                });
            });
            assert!(promise.is_disposed());
            let ran_late = Arc::clone(&ran);
            promise.on_completed(move || {
                ran_late.fetch_add(1, Ordering::SeqCst);
            });
        }
        tick_all(&engine).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        engine.shutdown();
        crate::test_complete!("continuation_racing_dispose_never_runs");
    }
}
