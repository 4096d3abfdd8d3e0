//! Cancellation source and token.
//!
//! A [`CancelSource`] is the exclusive owner of a cancellation signal; any
//! number of [`CancelToken`] observers can be handed out from it. Firing is
//! monotonic: once canceled, a token never resets. Repeated cancel requests
//! only strengthen the recorded [`CancelReason`].

use crate::types::CancelReason;
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

struct TokenState {
    cancelled: AtomicBool,
    inner: Mutex<TokenInner>,
}

struct TokenInner {
    reason: Option<CancelReason>,
    waiters: Slab<Waker>,
}

impl TokenState {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            inner: Mutex::new(TokenInner {
                reason: None,
                waiters: Slab::new(),
            }),
        }
    }

    fn cancel(&self, reason: &CancelReason) -> bool {
        let wakers: Vec<Waker> = {
            let mut inner = self.inner.lock();
            if let Some(current) = inner.reason.as_mut() {
                current.strengthen(reason);
                return false;
            }
            inner.reason = Some(reason.clone());
            self.cancelled.store(true, Ordering::Release);
            inner.waiters.drain().collect()
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Registers `waker` under `key`, reusing the slot across polls.
    ///
    /// Returns `true` if the token is already canceled.
    fn register(&self, key: &mut Option<usize>, waker: &Waker) -> bool {
        let mut inner = self.inner.lock();
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match *key {
            Some(k) if inner.waiters.contains(k) => {
                let slot = &mut inner.waiters[k];
                if !slot.will_wake(waker) {
                    slot.clone_from(waker);
                }
            }
            _ => *key = Some(inner.waiters.insert(waker.clone())),
        }
        false
    }

    fn deregister(&self, key: usize) {
        let mut inner = self.inner.lock();
        if inner.waiters.contains(key) {
            inner.waiters.remove(key);
        }
    }
}

/// Exclusive owner of a cancellation signal.
pub struct CancelSource {
    state: Arc<TokenState>,
}

impl CancelSource {
    /// Creates a new, un-fired source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState::new()),
        }
    }

    /// Returns an observer for this source.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Fires the signal.
    ///
    /// Returns `true` on the first call; later calls only strengthen the
    /// recorded reason.
    pub fn cancel(&self, reason: &CancelReason) -> bool {
        self.state.cancel(reason)
    }

    /// Returns true once the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Read-only observer of a [`CancelSource`].
#[derive(Clone)]
pub struct CancelToken {
    state: Option<Arc<TokenState>>,
}

impl CancelToken {
    /// A token that can never fire.
    #[must_use]
    pub const fn never() -> Self {
        Self { state: None }
    }

    /// Returns true once the source has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.cancelled.load(Ordering::Acquire))
    }

    /// Returns the recorded reason, if the source has fired.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.state.as_ref()?.inner.lock().reason.clone()
    }

    /// Returns a future that resolves once the source fires.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            token: self.clone(),
            key: None,
        }
    }

    pub(crate) fn register(&self, key: &mut Option<usize>, waker: &Waker) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.register(key, waker))
    }

    pub(crate) fn deregister(&self, key: &mut Option<usize>) {
        if let (Some(state), Some(k)) = (self.state.as_ref(), key.take()) {
            state.deregister(k);
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Future returned by [`CancelToken::cancelled`].
///
/// Dropping it releases the waker slot held in the source.
#[must_use = "futures do nothing unless polled"]
pub struct Cancelled {
    token: CancelToken,
    key: Option<usize>,
}

impl Future for Cancelled {
    type Output = CancelReason;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if this.token.register(&mut this.key, cx.waker()) {
            this.key = None;
            return Poll::Ready(this.token.reason().unwrap_or_default());
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        self.token.deregister(&mut self.key);
    }
}
