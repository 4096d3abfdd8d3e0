//! The engine: configuration, construction and the running context.
//!
//! - [`config`]: [`EngineConfig`] and its defaults
//! - [`builder`]: fluent [`EngineBuilder`]
//! - [`engine`]: the [`Engine`] handle owning dispatcher, timers and
//!   lifecycle
//! - [`timer`]: deadline heap backing the timer thread

pub mod builder;
pub mod config;
pub mod engine;
pub mod timer;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use engine::Engine;
