//! Progress snapshots reported by long-running computations.

/// A progress snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressData {
    /// Total units of work, or zero when unknown.
    pub total: u64,
    /// Units of work completed so far.
    pub current: u64,
    /// Set once the computation reports completion.
    pub done: bool,
}

impl ProgressData {
    /// Creates an in-flight snapshot.
    #[must_use]
    pub const fn new(total: u64, current: u64) -> Self {
        Self {
            total,
            current,
            done: false,
        }
    }

    /// Creates a finished snapshot.
    #[must_use]
    pub const fn finished(total: u64) -> Self {
        Self {
            total,
            current: total,
            done: true,
        }
    }

    /// Fraction of work completed in `0.0..=1.0`.
    ///
    /// A finished snapshot or one with an unknown total reports `1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completed_percent(&self) -> f32 {
        if self.done || self.total == 0 {
            return 1.0;
        }
        (self.current.min(self.total) as f64 / self.total as f64) as f32
    }
}
