use std::time::{Duration, Instant};

use nutriscale_traits::AbortSignal;

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    poll_until(|| Ok(!is_high()), None, timeout, poll_interval).map_err(|e| match e {
        HwError::Timeout => HwError::DataReadyTimeout,
        other => other,
    })
}

/// Poll `done` every `poll_interval` until it reports `true`.
///
/// Fails with `Timeout` once `timeout` has elapsed and with `Aborted` as soon
/// as `abort` is raised. Errors from `done` are returned unchanged.
pub fn poll_until(
    mut done: impl FnMut() -> Result<bool>,
    abort: Option<&AbortSignal>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if done()? {
            return Ok(());
        }
        if abort.is_some_and(AbortSignal::is_raised) {
            return Err(HwError::Aborted);
        }
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
}
