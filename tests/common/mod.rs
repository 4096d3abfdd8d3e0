//! Shared helpers for integration tests.

#![allow(dead_code)]

use pledge::{Engine, ErrorValue, Fault, Promise};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub use pledge::test_utils::{DEFAULT_TEST_TIMEOUT, init_test_logging, pump_until, tick_all};

/// Root of the test fault hierarchy.
#[derive(Debug, thiserror::Error)]
#[error("io failure: {0}")]
pub struct IoFault(pub String);
impl Fault for IoFault {}

/// Derived from [`IoFault`].
#[derive(Debug, thiserror::Error)]
#[error("not found: {path}")]
pub struct NotFound {
    pub path: String,
    pub base: IoFault,
}
impl Fault for NotFound {
    fn parent(&self) -> Option<&dyn Fault> {
        Some(&self.base)
    }
}

pub fn not_found(path: &str) -> NotFound {
    NotFound {
        path: path.to_string(),
        base: IoFault(format!("open {path}")),
    }
}

/// A computation that finishes with `value` once `open` is set.
pub fn gated<T>(engine: &Engine, open: &Arc<AtomicBool>, value: T) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    let open = Arc::clone(open);
    let timers = engine.clone();
    engine.wrap(async move {
        while !open.load(Ordering::SeqCst) {
            timers.sleep(Duration::from_millis(1)).await;
        }
        Ok::<T, ErrorValue>(value)
    })
}

/// Blocks until `done` holds without draining any phase.
pub fn wait_without_pumping(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + DEFAULT_TEST_TIMEOUT;
    while !done() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    true
}
