//! Process lifecycle signal.
//!
//! The lifecycle signal is the root of every promise's cancellation: it fires
//! exactly once, at shutdown, and every effective token is linked to it.
//! Quit listeners run after the token has fired, in registration order.

use crate::cancel::{CancelSource, CancelToken};
use crate::tracing_compat::debug;
use crate::types::id::IdCounter;
use crate::types::{CancelReason, ListenerId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;

type QuitListener = Box<dyn FnOnce() + Send>;

struct Listeners {
    fired: bool,
    pending: BTreeMap<ListenerId, QuitListener>,
}

/// Fires once at process shutdown.
pub struct LifecycleSignal {
    source: CancelSource,
    listeners: Mutex<Listeners>,
    ids: IdCounter,
}

impl LifecycleSignal {
    /// Creates an un-fired signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: CancelSource::new(),
            listeners: Mutex::new(Listeners {
                fired: false,
                pending: BTreeMap::new(),
            }),
            ids: IdCounter::new(),
        }
    }

    /// Returns an observer of the lifecycle token.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.source.token()
    }

    /// Returns true once the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.source.is_cancelled()
    }

    /// Registers a listener that runs once at shutdown.
    ///
    /// A listener added after the signal fired runs immediately on the
    /// calling thread.
    pub fn add_quit_listener<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = ListenerId::from_raw(self.ids.next());
        let mut listeners = self.listeners.lock();
        if listeners.fired {
            drop(listeners);
            listener();
        } else {
            listeners.pending.insert(id, Box::new(listener));
        }
        id
    }

    /// Removes a listener that has not run yet.
    ///
    /// Returns `false` if the listener was unknown or already ran.
    pub fn remove_quit_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().pending.remove(&id).is_some()
    }

    /// Fires the signal and runs every registered listener.
    ///
    /// Returns `false` if the signal had already fired.
    pub fn fire(&self) -> bool {
        let pending = {
            let mut listeners = self.listeners.lock();
            if listeners.fired {
                return false;
            }
            listeners.fired = true;
            std::mem::take(&mut listeners.pending)
        };
        self.source.cancel(&CancelReason::shutdown());
        debug!(listeners = pending.len(), "lifecycle signal fired");
        for listener in pending.into_values() {
            listener();
        }
        true
    }
}

impl Default for LifecycleSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleSignal")
            .field("fired", &self.is_fired())
            .finish_non_exhaustive()
    }
}
