//! Await contract and its shared state machine.
//!
//! [`AwaiterCore`] owns a promise's settlement state and the two kinds of
//! waiters that observe it: queued continuations registered through
//! [`Awaiter::on_completed`], and task wakers registered by futures polling
//! the promise. The state leaves `Pending` through exactly one
//! compare-and-swap.
//!
//! On success or fault, wakers are released as a `WakeBatch` that the
//! promise queues behind its callbacks, so an awaiting task resumes only
//! after those callbacks ran. Cancellation and disposal wake tasks at once.

use crate::types::PromiseState;
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::Waker;

/// A zero-argument callback run once a promise completes.
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// The await contract shared by every promise.
pub trait Awaiter {
    /// Current settlement state.
    fn state(&self) -> PromiseState;

    /// Returns true once the promise has left `Pending`.
    fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Registers a continuation.
    ///
    /// Runs it immediately if the promise has already released its waiters;
    /// otherwise it is queued on the promise's phase when it completes.
    fn on_completed(&self, continuation: Continuation);
}

/// What happens to a continuation handed to [`AwaiterCore::register`].
pub(crate) enum Registration {
    /// Stored; it will be released later.
    Queued,
    /// Waiters were already released; the caller should run it now.
    RunNow(Continuation),
    /// Waiters were discarded; the continuation was dropped.
    Dropped,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Release {
    Open,
    Fired,
    Discarded,
}

struct Waiters {
    release: Release,
    continuations: Vec<Continuation>,
    wakers: Slab<Waker>,
}

/// Settlement state plus registered waiters.
pub(crate) struct AwaiterCore {
    state: AtomicU8,
    waiters: Mutex<Waiters>,
}

impl AwaiterCore {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(PromiseState::Pending as u8),
            waiters: Mutex::new(Waiters {
                release: Release::Open,
                continuations: Vec::new(),
                wakers: Slab::new(),
            }),
        }
    }

    pub(crate) fn state(&self) -> PromiseState {
        PromiseState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `Pending` to `to`. Returns false if another transition won.
    pub(crate) fn transition(&self, to: PromiseState) -> bool {
        debug_assert!(to.is_terminal());
        self.state
            .compare_exchange(
                PromiseState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn register(&self, continuation: Continuation) -> Registration {
        let mut waiters = self.waiters.lock();
        match waiters.release {
            Release::Open => {
                waiters.continuations.push(continuation);
                Registration::Queued
            }
            Release::Fired => Registration::RunNow(continuation),
            Release::Discarded => Registration::Dropped,
        }
    }

    /// Stores a task waker under `key`. Returns false if the promise is
    /// already settled and the caller should not wait.
    pub(crate) fn register_waker(&self, key: &mut Option<usize>, waker: &Waker) -> bool {
        let mut waiters = self.waiters.lock();
        if self.state().is_terminal() {
            return false;
        }
        match *key {
            Some(k) if waiters.wakers.contains(k) => {
                let slot = &mut waiters.wakers[k];
                if !slot.will_wake(waker) {
                    slot.clone_from(waker);
                }
            }
            _ => *key = Some(waiters.wakers.insert(waker.clone())),
        }
        true
    }

    pub(crate) fn deregister_waker(&self, key: &mut Option<usize>) {
        if let Some(k) = key.take() {
            let mut waiters = self.waiters.lock();
            if waiters.wakers.contains(k) {
                waiters.wakers.remove(k);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn waiting_tasks(&self) -> usize {
        self.waiters.lock().wakers.len()
    }

    /// Hands back every continuation and task waker for queuing.
    pub(crate) fn fire(&self) -> (Vec<Continuation>, WakeBatch) {
        let (continuations, wakers) = self.release(Release::Fired);
        (continuations, WakeBatch(wakers))
    }

    /// Drops every continuation without running it and wakes every task.
    ///
    /// `terminal` decides whether later continuations run (`true`, the
    /// promise was canceled) or are dropped (`false`, it was disposed).
    pub(crate) fn discard(&self, terminal: bool) {
        let release = if terminal {
            Release::Fired
        } else {
            Release::Discarded
        };
        let (continuations, wakers) = self.release(release);
        drop(continuations);
        wake_all(wakers);
    }

    fn release(&self, release: Release) -> (Vec<Continuation>, Vec<Waker>) {
        let mut waiters = self.waiters.lock();
        if waiters.release != Release::Discarded {
            waiters.release = release;
        }
        let continuations = std::mem::take(&mut waiters.continuations);
        let wakers = waiters.wakers.drain().collect();
        (continuations, wakers)
    }
}

fn wake_all(wakers: Vec<Waker>) {
    for waker in wakers {
        waker.wake();
    }
}

/// Task wakers released by [`AwaiterCore::fire`].
///
/// Wakes every task when dropped, so a batch lost with a stopped phase
/// still releases its awaiters.
#[must_use = "dropping a wake batch wakes its tasks immediately"]
pub(crate) struct WakeBatch(Vec<Waker>);

impl WakeBatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for WakeBatch {
    fn drop(&mut self) {
        wake_all(std::mem::take(&mut self.0));
    }
}

impl fmt::Debug for AwaiterCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let waiters = self.waiters.lock();
        f.debug_struct("AwaiterCore")
            .field("state", &self.state())
            .field("release", &waiters.release)
            .field("continuations", &waiters.continuations.len())
            .field("wakers", &waiters.wakers.len())
            .finish()
    }
}
