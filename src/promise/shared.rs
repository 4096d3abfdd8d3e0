//! State shared between a promise handle, its worker and queued callbacks.
//!
//! Every state transition happens while holding the chain lock, so a
//! callback registered concurrently with settlement is either taken by the
//! settling thread or sees the terminal state and runs late. Outcome data
//! (result, fault, cancel reason) is written before the state leaves
//! `Pending`, so lock-free readers that observe a terminal state also
//! observe its data.

use crate::awaiter::{AwaiterCore, Continuation, Registration};
use crate::cancel::{CancelSource, LinkedToken};
use crate::catch::{
    ErrorHandlerRegistry, ErrorValue, Fault, OperationCanceled, Panicked, Resolution,
};
use crate::dispatch::Action;
use crate::runtime::Engine;
use crate::tracing_compat::{trace, warn};
use crate::types::{CancelReason, Phase, ProgressData, PromiseId, PromiseState};
use futures_lite::FutureExt;
use futures_lite::future;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

pub(crate) type SuccessCallback<T> = Box<dyn FnOnce(&T) + Send + 'static>;
pub(crate) type StepFuture = Pin<Box<dyn Future<Output = Result<(), ErrorValue>> + 'static>>;
pub(crate) type Step<T> = Box<dyn FnOnce(&T) -> StepFuture + Send + 'static>;
pub(crate) type ProgressCallback = Box<dyn FnMut(ProgressData) + Send + 'static>;
type FinalCallback = Box<dyn FnOnce() + Send + 'static>;

/// Callback lists, taken once at settlement.
struct Chain<T> {
    phase: Phase,
    success: Vec<SuccessCallback<T>>,
    steps: VecDeque<Step<T>>,
    registry: Option<ErrorHandlerRegistry>,
    finals: Vec<FinalCallback>,
}

impl<T> Chain<T> {
    fn clear(&mut self) {
        self.success.clear();
        self.steps.clear();
        self.finals.clear();
        if let Some(registry) = self.registry.as_mut() {
            registry.clear_callbacks();
        }
    }
}

/// How a cancellation race or a guarded computation ended early.
pub(crate) enum Interrupt {
    Canceled(CancelReason),
    Faulted(ErrorValue),
}

/// Awaits `work`, converting a panic into a [`Panicked`] fault.
pub(crate) async fn catch_panic<X, F>(work: F) -> Result<X, ErrorValue>
where
    F: Future<Output = Result<X, ErrorValue>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(ErrorValue::new(Panicked::from_payload(&*payload))),
    }
}

/// Awaits `work` unless `token` fires first.
///
/// The token is polled first, so when both are ready cancellation wins.
pub(crate) async fn race<X, F>(token: &LinkedToken, work: F) -> Result<X, Interrupt>
where
    F: Future<Output = Result<X, ErrorValue>>,
{
    future::or(
        async { Err(Interrupt::Canceled(token.cancelled().await)) },
        async { catch_panic(work).await.map_err(Interrupt::Faulted) },
    )
    .await
}

pub(crate) struct Shared<T> {
    pub(crate) id: PromiseId,
    pub(crate) engine: Engine,
    pub(crate) core: AwaiterCore,
    result: OnceLock<T>,
    fault: OnceLock<ErrorValue>,
    reason: OnceLock<CancelReason>,
    chain: Mutex<Chain<T>>,
    progress: Mutex<Vec<ProgressCallback>>,
    local: CancelSource,
    pub(crate) token: LinkedToken,
    disposed: AtomicBool,
}

impl<T: Send + Sync + 'static> Shared<T> {
    pub(crate) fn new(engine: Engine, id: PromiseId, phase: Phase) -> Arc<Self> {
        let local = CancelSource::new();
        let token = LinkedToken::pair(local.token(), engine.lifecycle_token());
        Arc::new(Self {
            id,
            engine,
            core: AwaiterCore::new(),
            result: OnceLock::new(),
            fault: OnceLock::new(),
            reason: OnceLock::new(),
            chain: Mutex::new(Chain {
                phase,
                success: Vec::new(),
                steps: VecDeque::new(),
                registry: Some(ErrorHandlerRegistry::new(id)),
                finals: Vec::new(),
            }),
            progress: Mutex::new(Vec::new()),
            local,
            token,
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn state(&self) -> PromiseState {
        self.core.state()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn phase(&self) -> Phase {
        self.chain.lock().phase
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.chain.lock().phase = phase;
    }

    pub(crate) fn value(&self) -> Option<&T> {
        match self.state() {
            PromiseState::Succeeded => self.result.get(),
            _ => None,
        }
    }

    pub(crate) fn fault(&self) -> Option<&ErrorValue> {
        match self.state() {
            PromiseState::Faulted => self.fault.get(),
            _ => None,
        }
    }

    pub(crate) fn cancel_reason(&self) -> Option<CancelReason> {
        match self.state() {
            PromiseState::Canceled => Some(self.reason.get().cloned().unwrap_or_default()),
            _ => None,
        }
    }

    /// Wraps an action so it does nothing once the promise is disposed.
    fn guard(self: &Arc<Self>, action: impl FnOnce() + Send + 'static) -> Action {
        let shared = Arc::clone(self);
        Box::new(move || {
            if !shared.is_disposed() {
                action();
            }
        })
    }

    // --- registration -----------------------------------------------------

    pub(crate) fn add_success(self: &Arc<Self>, callback: SuccessCallback<T>) {
        let mut chain = self.chain.lock();
        if self.is_disposed() {
            return;
        }
        match self.state() {
            PromiseState::Pending => chain.success.push(callback),
            PromiseState::Succeeded => {
                drop(chain);
                if let Some(value) = self.result.get() {
                    callback(value);
                }
            }
            PromiseState::Faulted | PromiseState::Canceled => {}
        }
    }

    pub(crate) fn add_step(self: &Arc<Self>, step: Step<T>) {
        let mut chain = self.chain.lock();
        if self.is_disposed() {
            return;
        }
        match self.state() {
            PromiseState::Pending => chain.steps.push_back(step),
            PromiseState::Succeeded => {
                drop(chain);
                self.run_late_step(step);
            }
            PromiseState::Faulted | PromiseState::Canceled => {}
        }
    }

    /// Runs a step registered after success on its own worker.
    fn run_late_step(self: &Arc<Self>, step: Step<T>) {
        let shared = Arc::clone(self);
        let spawned = self.engine.spawn_worker(self.id, move || {
            let Some(value) = shared.result.get() else {
                return;
            };
            if let Err(err) = future::block_on(catch_panic(step(value))) {
                warn!(
                    promise_id = %shared.id,
                    error_type = err.type_name(),
                    error = %err,
                    "chained step registered after success failed"
                );
            }
        });
        if let Err(err) = spawned {
            warn!(promise_id = %self.id, error = %err, "failed to spawn late chained step");
        }
    }

    pub(crate) fn add_catch<E, F>(self: &Arc<Self>, callback: F)
    where
        E: Fault,
        F: FnOnce(&E) + Send + 'static,
    {
        let mut chain = self.chain.lock();
        if self.is_disposed() {
            return;
        }
        match self.state() {
            PromiseState::Pending => {
                if let Some(registry) = chain.registry.as_mut() {
                    registry.add::<E, F>(callback);
                }
            }
            PromiseState::Faulted => {
                let (Some(err), Some(registry)) = (self.fault.get(), chain.registry.as_mut())
                else {
                    return;
                };
                if !registry.accepts_late::<E>(err) {
                    return;
                }
                registry.remember::<E>(err);
                drop(chain);
                if let Some(view) = err.find::<E>() {
                    callback(view);
                }
            }
            PromiseState::Succeeded | PromiseState::Canceled => {}
        }
    }

    pub(crate) fn add_catch_any<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce(&ErrorValue) + Send + 'static,
    {
        let mut chain = self.chain.lock();
        if self.is_disposed() {
            return;
        }
        match self.state() {
            PromiseState::Pending => {
                if let Some(registry) = chain.registry.as_mut() {
                    registry.add_universal(callback);
                }
            }
            PromiseState::Faulted => {
                let (Some(err), Some(registry)) = (self.fault.get(), chain.registry.as_mut())
                else {
                    return;
                };
                if !registry.accepts_late_universal() {
                    return;
                }
                registry.remember_universal(err);
                drop(chain);
                callback(err);
            }
            PromiseState::Succeeded | PromiseState::Canceled => {}
        }
    }

    pub(crate) fn add_final(self: &Arc<Self>, callback: FinalCallback) {
        let mut chain = self.chain.lock();
        if self.is_disposed() {
            return;
        }
        if self.state() == PromiseState::Pending {
            chain.finals.push(callback);
        } else {
            drop(chain);
            callback();
        }
    }

    pub(crate) fn add_progress(&self, callback: ProgressCallback) {
        if self.is_disposed() || self.state().is_terminal() {
            return;
        }
        self.progress.lock().push(callback);
    }

    pub(crate) fn add_continuation(self: &Arc<Self>, continuation: Continuation) {
        if let Registration::RunNow(continuation) = self.core.register(continuation) {
            continuation();
        }
    }

    pub(crate) fn get_error<E: Fault>(&self) -> Option<ErrorValue> {
        self.chain
            .lock()
            .registry
            .as_ref()
            .and_then(ErrorHandlerRegistry::get_error::<E>)
    }

    // --- progress ---------------------------------------------------------

    pub(crate) fn report_progress(self: &Arc<Self>, data: ProgressData) {
        if self.is_disposed() || self.state().is_terminal() {
            return;
        }
        let shared = Arc::clone(self);
        self.engine
            .dispatch(self.phase(), Box::new(move || shared.deliver_progress(data)));
    }

    fn deliver_progress(&self, data: ProgressData) {
        if self.is_disposed() || self.state() == PromiseState::Canceled {
            return;
        }
        let mut callbacks = std::mem::take(&mut *self.progress.lock());
        for callback in &mut callbacks {
            callback(data);
        }
        let mut slot = self.progress.lock();
        if !self.is_disposed() && self.state() != PromiseState::Canceled {
            callbacks.append(&mut slot);
            *slot = callbacks;
        }
    }

    // --- settlement -------------------------------------------------------

    /// Records a successful result, runs chained steps, then settles.
    pub(crate) async fn succeed(self: &Arc<Self>, value: T) {
        {
            let _chain = self.chain.lock();
            if self.state().is_terminal() {
                return;
            }
            if self.result.set(value).is_err() {
                return;
            }
        }

        loop {
            let step = {
                let mut chain = self.chain.lock();
                if self.state().is_terminal() {
                    return;
                }
                match chain.steps.pop_front() {
                    Some(step) => step,
                    None => {
                        let (phase, actions) = self.settle_succeeded(&mut chain);
                        drop(chain);
                        self.release(phase, actions);
                        return;
                    }
                }
            };
            let Some(value) = self.result.get() else {
                return;
            };
            match race(&self.token, step(value)).await {
                Ok(()) => {}
                Err(Interrupt::Canceled(reason)) => {
                    self.cancel_with(reason);
                    return;
                }
                Err(Interrupt::Faulted(err)) if err.is::<OperationCanceled>() => {
                    self.cancel_with(CancelReason::computation());
                    return;
                }
                Err(Interrupt::Faulted(err)) => {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    fn settle_succeeded(self: &Arc<Self>, chain: &mut Chain<T>) -> (Phase, Vec<Action>) {
        if !self.core.transition(PromiseState::Succeeded) {
            return (chain.phase, Vec::new());
        }
        let mut actions: Vec<Action> = Vec::with_capacity(chain.success.len() + chain.finals.len());
        for callback in chain.success.drain(..) {
            let shared = Arc::clone(self);
            actions.push(Box::new(move || {
                if shared.is_disposed() {
                    return;
                }
                if let Some(value) = shared.result.get() {
                    callback(value);
                }
            }));
        }
        for callback in chain.finals.drain(..) {
            actions.push(self.guard(callback));
        }
        chain.clear();
        self.engine.stats_ref().succeeded.inc();
        trace!(promise_id = %self.id, "promise succeeded");
        (chain.phase, actions)
    }

    /// Settles as faulted and routes the fault. Returns false if the
    /// promise had already settled.
    pub(crate) fn fail(self: &Arc<Self>, err: ErrorValue) -> bool {
        let (phase, actions, resolution) = {
            let mut chain = self.chain.lock();
            if self.state().is_terminal() {
                return false;
            }
            let _ = self.fault.set(err.clone());
            if !self.core.transition(PromiseState::Faulted) {
                return false;
            }
            chain.success.clear();
            chain.steps.clear();
            let mut actions = Vec::new();
            let resolution = match chain.registry.as_mut() {
                Some(registry) => registry.invoke(&err, |action| actions.push(self.guard(action))),
                None => Resolution::Unhandled,
            };
            for callback in chain.finals.drain(..) {
                actions.push(self.guard(callback));
            }
            (chain.phase, actions, resolution)
        };
        self.progress.lock().clear();
        let stats = self.engine.stats_ref();
        stats.faulted.inc();
        if !resolution.is_handled() {
            stats.unhandled.inc();
        }
        trace!(promise_id = %self.id, error_type = err.type_name(), "promise faulted");
        self.release(phase, actions);
        true
    }

    /// Settles as canceled, dropping every pending callback. Returns false
    /// if the promise had already settled.
    pub(crate) fn cancel_with(self: &Arc<Self>, reason: CancelReason) -> bool {
        {
            let mut chain = self.chain.lock();
            if self.state().is_terminal() {
                return false;
            }
            let _ = self.reason.set(reason.clone());
            if !self.core.transition(PromiseState::Canceled) {
                return false;
            }
            chain.clear();
        }
        self.progress.lock().clear();
        self.local.cancel(&reason);
        self.engine.stats_ref().canceled.inc();
        trace!(promise_id = %self.id, reason = %reason, "promise canceled");
        self.core.discard(true);
        true
    }

    /// Requests cancellation from the handle owner.
    pub(crate) fn cancel(self: &Arc<Self>) {
        let reason = CancelReason::user("canceled by caller");
        self.cancel_with(reason.clone());
        self.local.cancel(&reason);
    }

    pub(crate) fn dispose(self: &Arc<Self>) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Waiters registered from here on are dropped, not run.
        self.core.discard(false);
        let reason = CancelReason::disposed();
        self.cancel_with(reason.clone());
        self.local.cancel(&reason);
        {
            let mut chain = self.chain.lock();
            chain.clear();
            chain.registry = None;
        }
        self.progress.lock().clear();
        trace!(promise_id = %self.id, "promise disposed");
    }

    /// Queues settlement callbacks, then continuations, then the wakeup of
    /// awaiting tasks, all on `phase`.
    fn release(self: &Arc<Self>, phase: Phase, actions: Vec<Action>) {
        if self.is_disposed() {
            return;
        }
        for action in actions {
            self.engine.dispatch(phase, action);
        }
        let (continuations, wakers) = self.core.fire();
        for continuation in continuations {
            self.engine.dispatch(phase, self.guard(continuation));
        }
        if !wakers.is_empty() {
            // Refused or dropped unrun, the batch still wakes on drop.
            self.engine.dispatch(phase, Box::new(move || drop(wakers)));
        }
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("id", &self.id)
            .field("core", &self.core)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
