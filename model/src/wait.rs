/*!

Client-side polling of eventually-consistent cluster state.

An assertion is a closure that inspects the cluster once and either returns a value or fails.
[`wait_until`] calls it repeatedly, sleeping between attempts, for as long as it fails with an
[`ErrorKind::ExpectationMismatch`](crate::ErrorKind::ExpectationMismatch) and the deadline has
not passed. Every other error ends the wait immediately.

!*/

use crate::error::Result;
use log::{debug, warn};
use std::time::{Duration, Instant};

/// The time budget of one [`wait_until`] call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Deadline {
    start: Instant,
    timeout: Duration,
    interval: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn start(timeout: Duration, interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
            interval,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// `true` once more than `timeout` has elapsed since the start.
    pub fn expired(&self) -> bool {
        self.elapsed() > self.timeout
    }
}

/// Evaluate `assertion` until it succeeds, returning its value.
///
/// When the assertion fails with a retryable error and `timeout` has not yet elapsed, the loop
/// sleeps for `interval` and tries again. Once `timeout` has elapsed, the most recent error is
/// returned exactly as the assertion produced it. Because the deadline is only checked between
/// attempts, a failing wait ends between `timeout` and `timeout + interval` (plus the duration of
/// one attempt) after it started. There is no sleep after a success.
pub fn wait_until<T, F>(timeout: Duration, interval: Duration, mut assertion: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let deadline = Deadline::start(timeout, interval);
    loop {
        match assertion() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if deadline.expired() {
                    warn!(
                        "Expectation not met after {}s (timeout: {}s), failing",
                        deadline.elapsed().as_secs(),
                        timeout.as_secs()
                    );
                    return Err(e);
                }
                debug!(
                    "Expectation not met after {}s (timeout: {}s), retrying: {}",
                    deadline.elapsed().as_secs(),
                    timeout.as_secs(),
                    e
                );
            }
            Err(e) => return Err(e),
        }
        std::thread::sleep(interval);
    }
}
