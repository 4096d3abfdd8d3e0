//! Per-promise catch registry.
//!
//! Handlers are keyed by the error type they were registered for. When a
//! fault arrives, the registry picks the record for the most specific type
//! on the fault's ancestor chain that has one, falling back to the
//! universal record. Every callback of the chosen record is dispatched
//! once; records for other types are left alone.

use super::fault::{ErrorValue, Fault};
use crate::dispatch::Action;
use crate::tracing_compat::warn;
use crate::types::PromiseId;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::any::TypeId;
use std::fmt;

type Callback = Box<dyn FnOnce(&ErrorValue) + Send + 'static>;

/// Callbacks and the last routed fault for one key.
struct HandlerRecord {
    type_name: &'static str,
    last_seen: Option<ErrorValue>,
    callbacks: SmallVec<[Callback; 1]>,
}

impl HandlerRecord {
    fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            last_seen: None,
            callbacks: SmallVec::new(),
        }
    }

    fn fire(&mut self, error: &ErrorValue, dispatch: &mut impl FnMut(Action)) {
        self.last_seen = Some(error.clone());
        for callback in self.callbacks.drain(..) {
            let error = error.clone();
            dispatch(Box::new(move || callback(&error)));
        }
    }
}

/// Which record a fault was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A record keyed by the fault's own type.
    Exact(&'static str),
    /// A record keyed by one of the fault's ancestors.
    Ancestor(&'static str),
    /// The universal record.
    Universal,
    /// No callbacks anywhere; the fault was logged.
    Unhandled,
}

impl Resolution {
    /// Returns true unless the fault went unhandled.
    #[must_use]
    pub const fn is_handled(self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}

/// Catch handlers registered on one promise.
pub struct ErrorHandlerRegistry {
    owner: PromiseId,
    universal: HandlerRecord,
    typed: HashMap<TypeId, HandlerRecord>,
    // Chain depth of the typed record that took the routed fault.
    taken_depth: Option<usize>,
}

impl ErrorHandlerRegistry {
    /// Creates an empty registry for the given promise.
    #[must_use]
    pub fn new(owner: PromiseId) -> Self {
        Self {
            owner,
            universal: HandlerRecord::new("any"),
            typed: HashMap::new(),
            taken_depth: None,
        }
    }

    /// Registers a handler for any fault.
    pub fn add_universal<F>(&mut self, callback: F)
    where
        F: FnOnce(&ErrorValue) + Send + 'static,
    {
        self.universal.callbacks.push(Box::new(callback));
    }

    /// Registers a handler for faults that are, or descend from, `E`.
    ///
    /// The handler receives the fault viewed as `E`.
    pub fn add<E, F>(&mut self, callback: F)
    where
        E: Fault,
        F: FnOnce(&E) + Send + 'static,
    {
        let record = self
            .typed
            .entry(TypeId::of::<E>())
            .or_insert_with(|| HandlerRecord::new(std::any::type_name::<E>()));
        record.callbacks.push(Box::new(move |error: &ErrorValue| {
            if let Some(view) = error.find::<E>() {
                callback(view);
            }
        }));
    }

    /// Routes a fault and hands each chosen callback to `dispatch`.
    ///
    /// A fault no record takes is logged as a warning when the
    /// `tracing-integration` feature is on.
    pub fn invoke(&mut self, error: &ErrorValue, mut dispatch: impl FnMut(Action)) -> Resolution {
        let mut chosen = None;
        for (depth, fault) in error.chain().enumerate() {
            let key = fault.as_any().type_id();
            if self.typed.contains_key(&key) {
                chosen = Some((key, depth));
                break;
            }
        }

        if let Some((key, depth)) = chosen {
            if let Some(record) = self.typed.get_mut(&key) {
                record.fire(error, &mut dispatch);
                self.taken_depth = Some(depth);
                return if depth == 0 {
                    Resolution::Exact(record.type_name)
                } else {
                    Resolution::Ancestor(record.type_name)
                };
            }
        }

        if self.universal.callbacks.is_empty() {
            self.universal.last_seen = Some(error.clone());
            warn!(
                promise_id = %self.owner,
                error_type = error.type_name(),
                error = %error,
                "unhandled promise fault"
            );
            return Resolution::Unhandled;
        }
        self.universal.fire(error, &mut dispatch);
        Resolution::Universal
    }

    /// Returns true if a handler for `E` registered after routing should
    /// see `error`.
    ///
    /// `E` must be on the fault's chain and no further from the fault than
    /// the typed record that already took it.
    #[must_use]
    pub fn accepts_late<E: Fault>(&self, error: &ErrorValue) -> bool {
        depth_of::<E>(error)
            .is_some_and(|depth| self.taken_depth.is_none_or(|taken| depth <= taken))
    }

    /// Returns true if no typed record took the routed fault.
    #[must_use]
    pub fn accepts_late_universal(&self) -> bool {
        self.taken_depth.is_none()
    }

    /// Records `error` as seen by `E` without running anything.
    ///
    /// Used when a handler is registered after the fault was routed and is
    /// invoked directly by the caller.
    pub fn remember<E: Fault>(&mut self, error: &ErrorValue) {
        if let Some(depth) = depth_of::<E>(error) {
            self.taken_depth = Some(self.taken_depth.map_or(depth, |taken| taken.min(depth)));
        }
        self.typed
            .entry(TypeId::of::<E>())
            .or_insert_with(|| HandlerRecord::new(std::any::type_name::<E>()))
            .last_seen = Some(error.clone());
    }

    /// Records `error` as seen by the universal record.
    pub fn remember_universal(&mut self, error: &ErrorValue) {
        self.universal.last_seen = Some(error.clone());
    }

    /// Drops every pending callback, keeping the last seen faults.
    pub fn clear_callbacks(&mut self) {
        self.universal.callbacks.clear();
        for record in self.typed.values_mut() {
            record.callbacks.clear();
        }
    }

    /// Returns the last fault routed to the record for exactly `E`.
    #[must_use]
    pub fn get_error<E: Fault>(&self) -> Option<ErrorValue> {
        self.typed
            .get(&TypeId::of::<E>())
            .and_then(|record| record.last_seen.clone())
    }

    /// Returns the last fault routed to the universal record.
    #[must_use]
    pub fn last_universal(&self) -> Option<ErrorValue> {
        self.universal.last_seen.clone()
    }

    /// Returns true if no callbacks are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.universal.callbacks.is_empty()
            && self.typed.values().all(|record| record.callbacks.is_empty())
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.universal = HandlerRecord::new("any");
        self.typed.clear();
        self.taken_depth = None;
    }
}

/// Position of `E` on the fault's ancestor chain, the fault itself at 0.
fn depth_of<E: Fault>(error: &ErrorValue) -> Option<usize> {
    let key = TypeId::of::<E>();
    error.chain().position(|fault| fault.as_any().type_id() == key)
}

impl fmt::Debug for ErrorHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerRegistry")
            .field("owner", &self.owner)
            .field("universal", &self.universal.callbacks.len())
            .field(
                "typed",
                &self
                    .typed
                    .values()
                    .map(|record| record.type_name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
