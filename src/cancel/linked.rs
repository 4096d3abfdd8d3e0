//! Linked tokens: fire when any member fires.
//!
//! Every promise observes a linked token made of its own local token and the
//! process lifecycle token, so either one canceling the other's work is a
//! single check for the computation.

use super::token::CancelToken;
use crate::types::CancelReason;
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A token that reports cancellation once any of its members has fired.
#[derive(Debug, Clone)]
pub struct LinkedToken {
    members: SmallVec<[CancelToken; 2]>,
}

impl LinkedToken {
    /// Links the given tokens.
    #[must_use]
    pub fn new(members: impl IntoIterator<Item = CancelToken>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Links a local token with the lifecycle token.
    #[must_use]
    pub fn pair(local: CancelToken, lifecycle: CancelToken) -> Self {
        Self::new([local, lifecycle])
    }

    /// Returns true once any member has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.members.iter().any(CancelToken::is_cancelled)
    }

    /// Returns the strongest reason among the fired members.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.members
            .iter()
            .filter_map(CancelToken::reason)
            .reduce(|mut acc, r| {
                acc.strengthen(&r);
                acc
            })
    }

    /// Returns a future that resolves once any member fires.
    #[must_use]
    pub fn cancelled(&self) -> LinkedCancelled {
        LinkedCancelled {
            token: self.clone(),
            keys: self.members.iter().map(|_| None).collect(),
        }
    }
}

/// Future returned by [`LinkedToken::cancelled`].
#[must_use = "futures do nothing unless polled"]
pub struct LinkedCancelled {
    token: LinkedToken,
    keys: SmallVec<[Option<usize>; 2]>,
}

impl Future for LinkedCancelled {
    type Output = CancelReason;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let mut fired = false;
        for (member, key) in this.token.members.iter().zip(this.keys.iter_mut()) {
            if member.register(key, cx.waker()) {
                *key = None;
                fired = true;
            }
        }
        if fired {
            Poll::Ready(this.token.reason().unwrap_or_default())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for LinkedCancelled {
    fn drop(&mut self) {
        for (member, key) in self.token.members.iter().zip(self.keys.iter_mut()) {
            member.deregister(key);
        }
    }
}
