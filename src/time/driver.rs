//! Timer driver.
//!
//! A single background thread owns a [`TimerHeap`] and wakes registered
//! tasks when their deadlines pass. The thread is started on the first
//! registration and stopped by [`TimerDriver::shutdown`], which also wakes
//! every outstanding timer so no sleeper is left hanging.
//!
//! Registration returns a [`TimerHandle`]. A re-polled sleeper updates its
//! waker through the handle and a dropped one cancels it, so abandoned
//! timers do not linger until their deadline.

pub use crate::runtime::timer::TimerHandle;

use crate::runtime::timer::TimerHeap;
use crate::tracing_compat::{debug, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::task::Waker;
use std::thread::{self, JoinHandle};
use std::time::Instant;

struct TimerState {
    heap: TimerHeap,
    shutdown: bool,
    thread: Option<JoinHandle<()>>,
}

struct TimerInner {
    name: String,
    state: Mutex<TimerState>,
    condvar: Condvar,
}

/// Shared handle to the engine's timer thread.
#[derive(Clone)]
pub struct TimerDriver {
    inner: Arc<TimerInner>,
}

impl TimerDriver {
    /// Creates a driver whose thread will carry the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                name: name.into(),
                state: Mutex::new(TimerState {
                    heap: TimerHeap::new(),
                    shutdown: false,
                    thread: None,
                }),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Registers `waker` to be woken at `deadline`.
    ///
    /// Returns `None` if the driver is shut down or its thread could not be
    /// started; the caller should treat the deadline as already reached.
    pub fn register(&self, deadline: Instant, waker: Waker) -> Option<TimerHandle> {
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return None;
        }
        if state.thread.is_none() {
            let inner = Arc::clone(&self.inner);
            let spawned = thread::Builder::new()
                .name(self.inner.name.clone())
                .spawn(move || run(&inner));
            match spawned {
                Ok(handle) => state.thread = Some(handle),
                Err(err) => {
                    warn!(error = %err, "failed to start timer thread");
                    return None;
                }
            }
        }
        let earliest = state.heap.peek_deadline();
        let handle = state.heap.insert(deadline, waker);
        if earliest.is_none_or(|current| deadline < current) {
            self.inner.condvar.notify_one();
        }
        Some(handle)
    }

    /// Points a live timer at a new waker. Returns false if it already
    /// fired, was canceled or the driver shut down.
    pub fn update(&self, handle: &TimerHandle, waker: &Waker) -> bool {
        self.inner.state.lock().heap.update(handle, waker)
    }

    /// Cancels a live timer. Returns true if it had not fired yet.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        self.inner.state.lock().heap.cancel(handle)
    }

    /// Returns the number of live timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().heap.len()
    }

    /// Returns true once [`TimerDriver::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Stops the timer thread and wakes every outstanding timer.
    pub fn shutdown(&self) {
        let (wakers, handle) = {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            (state.heap.drain(), state.thread.take())
        };
        self.inner.condvar.notify_all();
        for waker in wakers {
            waker.wake();
        }
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("timer thread panicked");
            }
        }
        debug!("timer driver stopped");
    }
}

fn run(inner: &TimerInner) {
    let mut state = inner.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let due = state.heap.pop_expired(Instant::now());
        if !due.is_empty() {
            MutexGuard::unlocked(&mut state, || {
                for waker in due {
                    waker.wake();
                }
            });
            continue;
        }
        match state.heap.peek_deadline() {
            Some(deadline) => {
                inner.condvar.wait_until(&mut state, deadline);
            }
            None => inner.condvar.wait(&mut state),
        }
    }
}

impl fmt::Debug for TimerDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TimerDriver")
            .field("name", &self.inner.name)
            .field("pending", &state.heap.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}
