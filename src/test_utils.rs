//! Test utilities for pledge.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Frame-loop pumping for tests that wait on queued callbacks
//!
//! # Example
//! ```ignore
//! use pledge::test_utils::{init_test_logging, pump_until};
//!
//! init_test_logging();
//! let engine = pledge::Engine::new();
//! let promise = engine.wrap_ok(async { 42 });
//! assert!(pump_until(&engine, std::time::Duration::from_secs(5), || promise.is_completed()));
//! ```

use crate::error::DispatchError;
use crate::runtime::Engine;
use crate::types::Phase;
use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

static INIT_LOGGING: Once = Once::new();

/// Default upper bound for waits in tests.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Drains every running phase once, in frame order.
///
/// Returns the number of actions run. Stopped phases are skipped.
pub fn tick_all(engine: &Engine) -> Result<usize, DispatchError> {
    let mut total = 0;
    for phase in Phase::ALL {
        match engine.tick(phase) {
            Ok(ran) => total += ran,
            Err(DispatchError::NotRunning { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}

/// Ticks every phase until `done` returns true or `timeout` elapses.
///
/// Returns whether `done` was satisfied. Must be called from the thread
/// that started the engine's phases.
pub fn pump_until<P>(engine: &Engine, timeout: Duration, mut done: P) -> bool
where
    P: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if tick_all(engine).is_err() {
            return false;
        }
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            tracing::warn!(timeout_ms = timeout.as_millis(), "pump_until timed out");
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
