//! Timer heap for deadline management.
//!
//! This module provides a min-heap of deadlines backing the engine's timer
//! thread. Each timer is addressed by a [`TimerHandle`]; its waker lives in a
//! side table, so a canceled timer is dropped at once and its heap entry is
//! skipped when it surfaces.

use hashbrown::HashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::task::Waker;
use std::time::Instant;

/// Opaque handle for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
}

impl TimerHandle {
    /// Returns the timer identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct TimerEntry {
    deadline: Instant,
    id: u64,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by deadline.
#[derive(Debug, Default)]
pub struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    active: HashMap<u64, Waker>,
    next_id: u64,
}

impl TimerHeap {
    /// Creates a new empty timer heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns true if no timer is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Adds a waker to be woken at `deadline`.
    pub fn insert(&mut self, deadline: Instant, waker: Waker) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(TimerEntry { deadline, id });
        self.active.insert(id, waker);
        TimerHandle { id }
    }

    /// Replaces the waker of a live timer. Returns false if the timer already
    /// fired or was canceled.
    pub fn update(&mut self, handle: &TimerHandle, waker: &Waker) -> bool {
        match self.active.get_mut(&handle.id) {
            Some(slot) => {
                if !slot.will_wake(waker) {
                    slot.clone_from(waker);
                }
                true
            }
            None => false,
        }
    }

    /// Cancels a live timer, dropping its waker. Returns true if it was live.
    pub fn cancel(&mut self, handle: &TimerHandle) -> bool {
        if self.active.remove(&handle.id).is_none() {
            return false;
        }
        // Compact once stale entries dominate.
        if self.heap.len() > 2 * self.active.len() + 16 {
            let active = &self.active;
            self.heap.retain(|entry| active.contains_key(&entry.id));
        }
        true
    }

    /// Returns the earliest live deadline, if any.
    pub fn peek_deadline(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if self.active.contains_key(&entry.id) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the wakers of every live timer whose deadline is `<= now`, in
    /// deadline order.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<Waker> {
        let mut expired = Vec::new();
        while self.heap.peek().is_some_and(|entry| entry.deadline <= now) {
            if let Some(entry) = self.heap.pop() {
                expired.extend(self.active.remove(&entry.id));
            }
        }
        expired
    }

    /// Removes every timer, returning the live wakers.
    pub fn drain(&mut self) -> Vec<Waker> {
        self.heap.clear();
        self.active.drain().map(|(_, waker)| waker).collect()
    }
}
