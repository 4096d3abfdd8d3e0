//! Timers: the engine's timer thread and the [`Sleep`] future.

pub mod driver;
pub mod sleep;

pub use driver::TimerDriver;
pub use sleep::Sleep;
