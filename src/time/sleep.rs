//! Sleep future.

use super::driver::{TimerDriver, TimerHandle};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Completes once its deadline has passed.
///
/// If the timer driver has been shut down, the sleep completes on its next
/// poll. Dropping a pending sleep cancels its timer.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    driver: TimerDriver,
    deadline: Instant,
    timer: Option<TimerHandle>,
}

impl Sleep {
    /// Sleeps for `duration` from now.
    pub fn new(driver: TimerDriver, duration: Duration) -> Self {
        let deadline = Instant::now()
            .checked_add(duration)
            .unwrap_or_else(far_future);
        Self::until(driver, deadline)
    }

    /// Sleeps until `deadline`.
    pub fn until(driver: TimerDriver, deadline: Instant) -> Self {
        Self {
            driver,
            deadline,
            timer: None,
        }
    }

    /// Returns the deadline.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

// Roughly thirty years out; `Instant` has no MAX.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if Instant::now() >= this.deadline {
            this.cancel_timer();
            return Poll::Ready(());
        }
        if let Some(timer) = &this.timer {
            if this.driver.update(timer, cx.waker()) {
                return Poll::Pending;
            }
        }
        this.timer = this.driver.register(this.deadline, cx.waker().clone());
        if this.timer.is_some() {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}

impl Sleep {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.driver.cancel(&timer);
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;
    use std::task::Waker;

    #[test]
    fn sleep_waits_at_least_duration() {
        let driver = TimerDriver::new("sleep-test");
        let start = Instant::now();
        block_on(Sleep::new(driver.clone(), Duration::from_millis(15)));
        assert!(start.elapsed() >= Duration::from_millis(15));
        driver.shutdown();
    }

    #[test]
    fn sleep_on_stopped_driver_completes() {
        let driver = TimerDriver::new("sleep-test");
        driver.shutdown();
        let start = Instant::now();
        block_on(Sleep::new(driver, Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn zero_duration_is_immediate() {
        let driver = TimerDriver::new("sleep-test");
        block_on(Sleep::new(driver.clone(), Duration::ZERO));
        assert_eq!(driver.pending(), 0);
        driver.shutdown();
    }

    #[test]
    fn repoll_reuses_its_timer_and_drop_cancels_it() {
        let driver = TimerDriver::new("sleep-test");
        let mut sleep = Sleep::new(driver.clone(), Duration::from_secs(3600));
        let mut cx = Context::from_waker(Waker::noop());
        for _ in 0..3 {
            assert!(Pin::new(&mut sleep).poll(&mut cx).is_pending());
        }
        assert_eq!(driver.pending(), 1);
        drop(sleep);
        assert_eq!(driver.pending(), 0);
        driver.shutdown();
    }
}
