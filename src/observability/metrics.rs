//! Engine counters.
//!
//! Counters are monotonically increasing and updated with relaxed atomics
//! from any thread. [`EngineStats::snapshot`] gives a plain copy for
//! assertions and reporting.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Creates a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters tracked by one engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub(crate) created: Counter,
    pub(crate) succeeded: Counter,
    pub(crate) faulted: Counter,
    pub(crate) canceled: Counter,
    pub(crate) unhandled: Counter,
    pub(crate) dispatched: Counter,
    pub(crate) panicked: Counter,
}

impl EngineStats {
    /// Creates zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a plain copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created.value(),
            succeeded: self.succeeded.value(),
            faulted: self.faulted.value(),
            canceled: self.canceled.value(),
            unhandled: self.unhandled.value(),
            dispatched: self.dispatched.value(),
            panicked: self.panicked.value(),
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Promises constructed.
    pub created: u64,
    /// Promises settled `Succeeded`.
    pub succeeded: u64,
    /// Promises settled `Faulted`.
    pub faulted: u64,
    /// Promises settled `Canceled`.
    pub canceled: u64,
    /// Faults that reached no catch callback at all.
    pub unhandled: u64,
    /// Actions run by dispatch drains.
    pub dispatched: u64,
    /// Dispatched actions that panicked.
    pub panicked: u64,
}

impl StatsSnapshot {
    /// Promises that have settled in any terminal state.
    #[must_use]
    pub const fn settled(&self) -> u64 {
        self.succeeded + self.faulted + self.canceled
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} succeeded={} faulted={} canceled={} unhandled={} dispatched={} panicked={}",
            self.created,
            self.succeeded,
            self.faulted,
            self.canceled,
            self.unhandled,
            self.dispatched,
            self.panicked
        )
    }
}
