//! The process-scoped engine.
//!
//! An [`Engine`] owns everything promises share: the lifecycle signal, the
//! phased dispatcher, the timer thread and the counters. Build one at
//! startup, hand clones to whatever creates promises, and call
//! [`Engine::shutdown`] at exit. Dropping the last clone shuts it down too.
//!
//! Each promise runs its computation on a dedicated worker thread, so a
//! computation may block without stalling other promises. Callbacks are never
//! run on workers: they are queued on the promise's phase and run when the
//! host ticks that phase with [`Engine::tick`].

use super::builder::EngineBuilder;
use super::config::EngineConfig;
use crate::cancel::{CancelToken, LinkedToken};
use crate::catch::ErrorValue;
use crate::combinator;
use crate::dispatch::{Action, Dispatcher};
use crate::error::DispatchError;
use crate::lifecycle::LifecycleSignal;
use crate::observability::{EngineStats, StatsSnapshot};
use crate::promise::{Promise, ProgressReporter, launch};
use crate::time::{Sleep, TimerDriver};
use crate::tracing_compat::{debug, info};
use crate::types::id::IdCounter;
use crate::types::{ListenerId, Phase, PromiseId};
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct EngineInner {
    config: EngineConfig,
    lifecycle: LifecycleSignal,
    dispatcher: Arc<Dispatcher>,
    timers: TimerDriver,
    stats: Arc<EngineStats>,
    promise_ids: IdCounter,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.lifecycle.fire();
    }
}

/// Handle to the promise engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Builds an engine with the default configuration.
    ///
    /// Every phase is started and bound to the calling thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Builds an engine from an already validated configuration.
    pub(crate) fn with_config(config: EngineConfig) -> Self {
        let stats = Arc::new(EngineStats::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&stats)));
        let timers = TimerDriver::new(format!("{}-timer", config.worker_name_prefix));
        let lifecycle = LifecycleSignal::new();

        let on_quit = Arc::clone(&dispatcher);
        lifecycle.add_quit_listener(move || on_quit.close());
        let on_quit = timers.clone();
        lifecycle.add_quit_listener(move || on_quit.shutdown());

        for phase in &config.autostart_phases {
            dispatcher.start(*phase);
        }
        info!(
            default_phase = %config.default_phase,
            poll_interval_ms = config.poll_interval_ms,
            "engine started"
        );

        Self {
            inner: Arc::new(EngineInner {
                config,
                lifecycle,
                dispatcher,
                timers,
                stats,
                promise_ids: IdCounter::new(),
            }),
        }
    }

    /// Returns the configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns a copy of the engine counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns the number of live timers, sleeps included.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.pending()
    }

    pub(crate) fn stats_ref(&self) -> &EngineStats {
        &self.inner.stats
    }

    // --- lifecycle --------------------------------------------------------

    /// Returns the lifecycle token, which fires once at shutdown.
    #[must_use]
    pub fn lifecycle_token(&self) -> CancelToken {
        self.inner.lifecycle.token()
    }

    /// Links `local` with the lifecycle token.
    ///
    /// The result fires when either does.
    #[must_use]
    pub fn linked_token(&self, local: &CancelToken) -> LinkedToken {
        LinkedToken::pair(local.clone(), self.lifecycle_token())
    }

    /// Returns true once [`Engine::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.lifecycle.is_fired()
    }

    /// Fires the lifecycle signal.
    ///
    /// Every pending promise is canceled, quit listeners run in
    /// registration order, every phase stops and later actions are dropped.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        if self.inner.lifecycle.fire() {
            info!(stats = %self.stats(), "engine shut down");
        }
    }

    /// Registers a callback to run once at shutdown.
    ///
    /// Runs it immediately if the engine is already shut down.
    pub fn add_quit_listener<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.lifecycle.add_quit_listener(listener)
    }

    /// Removes a quit listener. Returns false if it already ran or was
    /// removed.
    pub fn remove_quit_listener(&self, id: ListenerId) -> bool {
        self.inner.lifecycle.remove_quit_listener(id)
    }

    // --- dispatch ---------------------------------------------------------

    /// Starts a phase and makes the calling thread its consumer.
    pub fn start_phase(&self, phase: Phase) {
        self.inner.dispatcher.start(phase);
    }

    /// Stops a phase, dropping its pending actions.
    pub fn stop_phase(&self, phase: Phase) {
        self.inner.dispatcher.stop(phase);
    }

    /// Returns true if the phase is started.
    #[must_use]
    pub fn is_phase_running(&self, phase: Phase) -> bool {
        self.inner.dispatcher.is_running(phase)
    }

    /// Returns the number of actions waiting in a phase.
    #[must_use]
    pub fn pending(&self, phase: Phase) -> usize {
        self.inner.dispatcher.pending(phase)
    }

    /// Queues an action on a phase from any thread.
    ///
    /// Returns false if the engine is shut down and the action was dropped.
    pub fn enqueue<F>(&self, phase: Phase, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(phase, Box::new(action))
    }

    pub(crate) fn dispatch(&self, phase: Phase, action: Action) -> bool {
        self.inner.dispatcher.enqueue(phase, action)
    }

    /// Queues an action on [`Phase::EndOfFrame`].
    pub fn run_on_end_of_frame<F>(&self, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Phase::EndOfFrame, action)
    }

    /// Drains a phase. Call once per host tick from the phase's consumer
    /// thread.
    pub fn tick(&self, phase: Phase) -> Result<usize, DispatchError> {
        self.inner.dispatcher.drain(phase)
    }

    // --- time -------------------------------------------------------------

    /// Returns a future that completes after `duration`.
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(self.inner.timers.clone(), duration)
    }

    // --- workers ----------------------------------------------------------

    pub(crate) fn next_promise_id(&self) -> PromiseId {
        PromiseId::from_raw(self.inner.promise_ids.next())
    }

    pub(crate) fn spawn_worker<F>(&self, id: PromiseId, work: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = format!("{}-{}", self.inner.config.worker_name_prefix, id.as_u64());
        thread::Builder::new().name(name).spawn(work)?;
        debug!(promise_id = %id, "worker spawned");
        Ok(())
    }

    // --- promise constructors --------------------------------------------

    /// Wraps a fallible future into a promise.
    ///
    /// The future starts immediately on its own worker thread. An `Err`
    /// settles the promise as faulted, unless the error is an
    /// [`OperationCanceled`](crate::catch::OperationCanceled), which cancels
    /// it.
    pub fn wrap<T, E, Fut>(&self, future: Fut) -> Promise<T>
    where
        T: Send + Sync + 'static,
        E: Into<ErrorValue>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        launch(self, |_, _| future)
    }

    /// Wraps an infallible future into a promise.
    pub fn wrap_ok<T, Fut>(&self, future: Fut) -> Promise<T>
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        launch(self, |_, _| async move { Ok::<T, Infallible>(future.await) })
    }

    /// Wraps a computation that observes its own cancellation.
    ///
    /// `make` runs on the worker thread and receives the promise's
    /// effective token, so the future it returns need not be `Send`.
    pub fn wrap_with<T, E, F, Fut>(&self, make: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        E: Into<ErrorValue>,
        F: FnOnce(LinkedToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        launch(self, move |token, _| make(token))
    }

    /// Like [`Engine::wrap_with`], also handing the computation a progress
    /// reporter whose reports reach [`Promise::progress`] callbacks.
    pub fn wrap_with_progress<T, E, F, Fut>(&self, make: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        E: Into<ErrorValue>,
        F: FnOnce(LinkedToken, ProgressReporter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        launch(self, make)
    }

    /// Runs a blocking closure on a worker thread.
    pub fn run<T, F>(&self, work: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        combinator::run(self, work)
    }

    /// Runs a fallible blocking closure on a worker thread.
    pub fn try_run<T, E, F>(&self, work: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        E: Into<ErrorValue>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        combinator::try_run(self, work)
    }

    /// Combines promises; see [`combinator::when_all`].
    pub fn when_all<T, I>(&self, promises: I) -> Promise<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = Promise<T>>,
    {
        combinator::when_all(self, promises)
    }

    /// Succeeds once `predicate` returns true; see
    /// [`combinator::wait_until`].
    pub fn wait_until<P>(&self, predicate: P) -> Promise<()>
    where
        P: FnMut() -> bool + Send + 'static,
    {
        combinator::wait_until(self, predicate)
    }

    /// Succeeds after `seconds`; see [`combinator::wait_for_seconds`].
    pub fn wait_for_seconds(&self, seconds: f64) -> Promise<()> {
        combinator::wait_for_seconds(self, seconds)
    }

    /// Succeeds after `duration`.
    pub fn wait_for(&self, duration: Duration) -> Promise<()> {
        combinator::wait_for(self, duration)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("shut_down", &self.is_shut_down())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
