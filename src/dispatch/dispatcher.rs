//! Phased dispatcher.
//!
//! One lane per [`Phase`]. A lane is stopped until [`Dispatcher::start`]
//! binds it to the calling thread, which becomes the only thread allowed to
//! drain it. Producers may enqueue from anywhere at any time; actions queued
//! while a lane is stopped wait for the next start. Once the dispatcher is
//! closed at shutdown, new actions are dropped.

use super::queue::{Action, PhaseQueue};
use crate::error::DispatchError;
use crate::observability::EngineStats;
use crate::tracing_compat::{debug, error, trace};
use crate::types::Phase;
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct Lane {
    running: AtomicBool,
    consumer: Mutex<Option<ThreadId>>,
    queue: PhaseQueue,
}

/// Per-phase FIFO queues drained by their consumer threads.
#[derive(Debug)]
pub struct Dispatcher {
    lanes: [Lane; Phase::COUNT],
    closed: AtomicBool,
    stats: Arc<EngineStats>,
}

impl Dispatcher {
    /// Creates a dispatcher with every phase stopped.
    #[must_use]
    pub fn new(stats: Arc<EngineStats>) -> Self {
        Self {
            lanes: std::array::from_fn(|_| Lane::default()),
            closed: AtomicBool::new(false),
            stats,
        }
    }

    fn lane(&self, phase: Phase) -> &Lane {
        &self.lanes[phase.index()]
    }

    /// Starts a phase and binds it to the calling thread.
    ///
    /// Restarting a running phase rebinds it.
    pub fn start(&self, phase: Phase) {
        if self.is_closed() {
            return;
        }
        let lane = self.lane(phase);
        *lane.consumer.lock() = Some(thread::current().id());
        lane.running.store(true, Ordering::Release);
        debug!(phase = %phase, pending = lane.queue.len(), "phase started");
    }

    /// Stops a phase and drops its pending actions.
    pub fn stop(&self, phase: Phase) {
        let lane = self.lane(phase);
        lane.running.store(false, Ordering::Release);
        *lane.consumer.lock() = None;
        let dropped = lane.queue.clear();
        debug!(phase = %phase, dropped, "phase stopped");
    }

    /// Stops every phase.
    pub fn stop_all(&self) {
        for phase in Phase::ALL {
            self.stop(phase);
        }
    }

    /// Stops every phase and refuses further actions.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.stop_all();
    }

    /// Returns true once [`Dispatcher::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns true if the phase is started.
    #[must_use]
    pub fn is_running(&self, phase: Phase) -> bool {
        self.lane(phase).running.load(Ordering::Acquire)
    }

    /// Returns the number of actions waiting in a phase.
    #[must_use]
    pub fn pending(&self, phase: Phase) -> usize {
        self.lane(phase).queue.len()
    }

    /// Queues an action. Returns false if the dispatcher is closed and the
    /// action was dropped.
    pub fn enqueue(&self, phase: Phase, action: Action) -> bool {
        if self.is_closed() {
            trace!(phase = %phase, "dispatcher closed; action dropped");
            return false;
        }
        self.lane(phase).queue.push(action);
        true
    }

    /// Runs every queued action of a phase, including actions queued while
    /// draining. Returns how many ran.
    pub fn drain(&self, phase: Phase) -> Result<usize, DispatchError> {
        let lane = self.lane(phase);
        if !lane.running.load(Ordering::Acquire) {
            return Err(DispatchError::NotRunning { phase });
        }
        if *lane.consumer.lock() != Some(thread::current().id()) {
            return Err(DispatchError::NotConsumer { phase });
        }

        let mut ran = 0;
        while let Some(action) = lane.queue.pop() {
            ran += 1;
            self.stats.dispatched.inc();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
                self.stats.panicked.inc();
                let message = crate::catch::Panicked::from_payload(&*payload).message;
                error!(phase = %phase, panic = %message, "dispatched action panicked");
            }
        }
        Ok(ran)
    }
}
