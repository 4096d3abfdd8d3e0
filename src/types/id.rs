//! Identifier types for engine entities.
//!
//! Identifiers are minted from per-engine counters, so they are unique within
//! one engine and stable for the life of the entity they name.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for a promise.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    /// Creates a promise ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PromiseId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromiseId({})", self.0)
    }
}

impl fmt::Display for PromiseId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Handle returned by quit-listener registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Creates a listener ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Monotonic identifier source.
#[derive(Debug)]
pub(crate) struct IdCounter(AtomicU64);

impl IdCounter {
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_monotonic() {
        let counter = IdCounter::new();
        let a = PromiseId::from_raw(counter.next());
        let b = PromiseId::from_raw(counter.next());
        assert!(a < b);
        assert_eq!(a.as_u64() + 1, b.as_u64());
    }

    #[test]
    fn display_formats() {
        assert_eq!(PromiseId::from_raw(7).to_string(), "P7");
        assert_eq!(format!("{:?}", PromiseId::from_raw(7)), "PromiseId(7)");
        assert_eq!(ListenerId::from_raw(3).to_string(), "L3");
    }
}
