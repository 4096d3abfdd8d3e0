//! Fault hierarchy and catch routing.

pub mod fault;
pub mod registry;

pub use fault::{AggregateFault, ErrorValue, Fault, Message, OperationCanceled, Panicked};
pub use registry::{ErrorHandlerRegistry, Resolution};
