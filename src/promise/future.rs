//! Awaiting a promise.

use super::Promise;
use crate::error::Result;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future returned by `promise.into_future()` or `promise.await`.
///
/// A task waiting on the promise is woken from the promise's phase, after
/// the callbacks queued at settlement, so it resumes only once the host has
/// ticked that phase. A canceled promise wakes it at once. Polled after
/// settlement, it resolves without waiting. Dropping it while the promise
/// is pending disposes the promise.
#[must_use = "futures do nothing unless polled"]
pub struct PromiseFuture<T: Clone + Send + Sync + 'static> {
    promise: Promise<T>,
    key: Option<usize>,
}

impl<T: Clone + Send + Sync + 'static> PromiseFuture<T> {
    pub(crate) fn new(promise: Promise<T>) -> Self {
        Self { promise, key: None }
    }

    /// Returns the promise being awaited.
    #[must_use]
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

impl<T: Clone + Send + Sync + 'static> Future for PromiseFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let core = &this.promise.shared.core;
        if !this.promise.is_completed() && core.register_waker(&mut this.key, cx.waker()) {
            return Poll::Pending;
        }
        core.deregister_waker(&mut this.key);
        Poll::Ready(this.promise.get_result())
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for PromiseFuture<T> {
    fn drop(&mut self) {
        self.promise.shared.core.deregister_waker(&mut self.key);
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for PromiseFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseFuture")
            .field("promise", &self.promise)
            .finish()
    }
}
