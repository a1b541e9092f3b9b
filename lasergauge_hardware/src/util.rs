use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `done` every `poll_interval` until it holds; returns the time spent.
///
/// `done` is always checked once, so a zero timeout still succeeds on a
/// condition that already holds.
pub fn poll_until(
    mut done: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Duration> {
    let started = Instant::now();
    loop {
        if done() {
            return Ok(started.elapsed());
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(HwError::Timeout {
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            });
        }
        std::thread::sleep(poll_interval.min(timeout - waited));
    }
}
