use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Longest uninterrupted sleep; the keep-running flag is rechecked after each.
const SLICE: Duration = Duration::from_millis(10);

/// Pacing applied before every request attempt.
///
/// `delay` is a fixed per-request pause for each worker; `rate` caps the
/// requests per second across all workers sharing the throttle.
#[derive(Default)]
pub struct Throttle {
    delay: Duration,
    limiter: Option<DirectLimiter>,
}

impl Throttle {
    pub fn new(delay: Duration, rate: Option<u32>) -> Self {
        let limiter = rate
            .and_then(NonZeroU32::new)
            .map(|r| RateLimiter::direct(Quota::per_second(r).allow_burst(NonZeroU32::MIN)));
        Self { delay, limiter }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_limited(&self) -> bool {
        !self.delay.is_zero() || self.limiter.is_some()
    }

    /// Blocks the calling thread until the next request may go out.
    ///
    /// Returns `false` as soon as `running` is cleared while waiting; the
    /// caller must not send in that case.
    pub fn acquire(&self, running: &AtomicBool) -> bool {
        if !self.delay.is_zero() && !sleep_while_running(self.delay, running) {
            return false;
        }
        let Some(limiter) = self.limiter.as_ref() else {
            return running.load(Ordering::Acquire);
        };
        let clock = DefaultClock::default();
        loop {
            if !running.load(Ordering::Acquire) {
                return false;
            }
            match limiter.check() {
                Ok(()) => return true,
                Err(not_until) => {
                    let wait = not_until.wait_time_from(clock.now());
                    thread::sleep(wait.clamp(Duration::from_millis(1), SLICE));
                }
            }
        }
    }
}

fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(SLICE));
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("delay", &self.delay)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}
