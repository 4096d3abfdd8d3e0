//! Fault values and the error hierarchy.
//!
//! Rust has no inheritance, so the "is-a" relation between error types is
//! spelled out by each type: [`Fault::parent`] returns the same error viewed
//! as its next ancestor, usually a field the error embeds. Walking
//! `parent()` from an error gives its ancestor chain, most specific first.
//! Every chain implicitly ends at the universal base, which is any
//! [`ErrorValue`].
//!
//! ```ignore
//! #[derive(Debug, thiserror::Error)]
//! #[error("script error: {0}")]
//! struct ScriptError(String);
//! impl Fault for ScriptError {}
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("type error: {base}")]
//! struct TypeError { base: ScriptError }
//! impl Fault for TypeError {
//!     fn parent(&self) -> Option<&dyn Fault> { Some(&self.base) }
//! }
//! ```

use std::any::{Any, TypeId};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Object-safe access to `Any` for fault types.
#[doc(hidden)]
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An error type that can be routed through a catch registry.
pub trait Fault: AsAny + StdError + Send + Sync + 'static {
    /// This error viewed as its nearest ancestor type, if it has one.
    fn parent(&self) -> Option<&dyn Fault> {
        None
    }

    /// Type name used in logs.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A shared, type-erased fault.
///
/// Cloning is cheap; every clone refers to the same error instance.
#[derive(Clone)]
pub struct ErrorValue(Arc<dyn Fault>);

impl ErrorValue {
    /// Wraps a fault.
    #[must_use]
    pub fn new<F: Fault>(fault: F) -> Self {
        Self(Arc::new(fault))
    }

    /// Wraps a plain message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Returns the wrapped fault.
    #[must_use]
    pub fn as_fault(&self) -> &dyn Fault {
        &*self.0
    }

    /// Runtime type of the wrapped fault.
    #[must_use]
    pub fn fault_type_id(&self) -> TypeId {
        self.as_fault().as_any().type_id()
    }

    /// Runtime type name of the wrapped fault.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.as_fault().type_name()
    }

    /// Iterates the ancestor chain, starting with the fault itself.
    pub fn chain(&self) -> impl Iterator<Item = &dyn Fault> {
        std::iter::successors(Some(self.as_fault()), |fault| fault.parent())
    }

    /// Returns the view of this fault as `E`, if `E` is on its chain.
    #[must_use]
    pub fn find<E: Fault>(&self) -> Option<&E> {
        self.chain().find_map(|fault| fault.as_any().downcast_ref::<E>())
    }

    /// Returns true if `E` is the fault's type or one of its ancestors.
    #[must_use]
    pub fn is<E: Fault>(&self) -> bool {
        self.find::<E>().is_some()
    }

    /// Returns true if both values share the same error instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<F: Fault> From<F> for ErrorValue {
    fn from(fault: F) -> Self {
        Self::new(fault)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_fault(), f)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_fault(), f)
    }
}

impl StdError for ErrorValue {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.as_fault().source()
    }
}

/// A computation that stopped because it observed cancellation.
///
/// Settling with this fault cancels the promise instead of faulting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("operation canceled")]
pub struct OperationCanceled;

impl Fault for OperationCanceled {}

/// A computation panicked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("computation panicked: {message}")]
pub struct Panicked {
    /// The panic payload rendered as text.
    pub message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self { message }
    }
}

impl Fault for Panicked {}

/// Every member error of a combined promise.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} member(s) faulted; first: {}", .errors.len(), .errors.first().map_or_else(String::new, ToString::to_string))]
pub struct AggregateFault {
    /// Member errors in member order.
    pub errors: Vec<ErrorValue>,
}

impl Fault for AggregateFault {}

/// A fault carrying only a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Message(pub String);

impl Fault for Message {}

impl Fault for std::convert::Infallible {}
impl Fault for std::io::Error {}
impl Fault for std::fmt::Error {}
impl Fault for std::num::ParseIntError {}
impl Fault for std::num::ParseFloatError {}
