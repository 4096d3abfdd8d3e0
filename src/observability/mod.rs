//! Observability: engine counters.
//!
//! Structured logging goes through [`crate::tracing_compat`]; this module
//! holds the counters that back [`crate::Engine::stats`].

pub mod metrics;

pub use metrics::{Counter, EngineStats, StatsSnapshot};
