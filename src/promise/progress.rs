//! Progress reporting from inside a computation.

use super::shared::Shared;
use crate::types::ProgressData;
use std::fmt;
use std::sync::{Arc, Weak};

type Sink = Arc<dyn Fn(ProgressData) + Send + Sync + 'static>;

/// Sends [`ProgressData`] from a computation to its promise's progress
/// callbacks.
///
/// Reports are delivered on the promise's phase. Reports made after the
/// promise settled, or once it has been dropped, are ignored.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Sink,
}

impl ProgressReporter {
    pub(crate) fn for_promise<T: Send + Sync + 'static>(shared: &Arc<Shared<T>>) -> Self {
        let weak: Weak<Shared<T>> = Arc::downgrade(shared);
        Self {
            sink: Arc::new(move |data| {
                if let Some(shared) = weak.upgrade() {
                    shared.report_progress(data);
                }
            }),
        }
    }

    /// A reporter that discards every report.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            sink: Arc::new(|_| {}),
        }
    }

    /// Sends a snapshot.
    pub fn report(&self, data: ProgressData) {
        (self.sink)(data);
    }

    /// Sends an in-flight snapshot.
    pub fn update(&self, total: u64, current: u64) {
        self.report(ProgressData::new(total, current));
    }

    /// Sends the completion snapshot.
    pub fn finish(&self, total: u64) {
        self.report(ProgressData::finished(total));
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}
