// Poll-with-interval-and-deadline helpers used by calibration and homing

use std::time::Duration;

use crate::clock::{CancelToken, Clock};
use crate::error::{Error, Result};

/// How a bounded wait ended. Cancellation is reported as `Error::Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

/// Check `done` every `interval` until it returns true.
///
/// The condition is evaluated before the deadline, so a condition that
/// becomes true exactly at `timeout` still counts. `timeout: None` waits
/// indefinitely.
pub fn poll_until<C, F>(
    clock: &C,
    interval: Duration,
    timeout: Option<Duration>,
    cancel: &CancelToken,
    mut done: F,
) -> Result<WaitOutcome>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<bool>,
{
    let start = clock.now();
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if done()? {
            return Ok(WaitOutcome::Satisfied);
        }
        if let Some(limit) = timeout {
            if clock.now().duration_since(start) >= limit {
                return Ok(WaitOutcome::TimedOut);
            }
        }
        clock.sleep(interval);
    }
}

/// Sleep for `duration` in slices of at most `slice`, bailing out early
/// when `cancel` fires.
pub fn pause<C>(clock: &C, duration: Duration, slice: Duration, cancel: &CancelToken) -> Result<()>
where
    C: Clock + ?Sized,
{
    let slice = if slice.is_zero() { duration } else { slice };
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let step = remaining.min(slice);
        clock.sleep(step);
        remaining -= step;
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
