//! Per-phase action queue.
//!
//! A thread-safe unbounded FIFO that any producer thread can push into and
//! that only the phase's consumer thread pops from.

use crossbeam_queue::SegQueue;
use std::fmt;

/// A deferred zero-argument callback.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// FIFO of actions for one phase.
#[derive(Default)]
pub struct PhaseQueue {
    inner: SegQueue<Action>,
}

impl PhaseQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Appends an action.
    pub fn push(&self, action: Action) {
        self.inner.push(action);
    }

    /// Pops the oldest action.
    pub fn pop(&self) -> Option<Action> {
        self.inner.pop()
    }

    /// Drops every queued action, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.inner.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// Returns the number of queued actions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for PhaseQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn pops_in_push_order() {
        let queue = PhaseQueue::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            queue.push(Box::new(move || seen.lock().push(i)));
        }
        assert_eq!(queue.len(), 3);
        while let Some(action) = queue.pop() {
            action();
        }
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_drops_without_running() {
        let queue = PhaseQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let ran = Arc::clone(&ran);
            queue.push(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(queue.clear(), 4);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
