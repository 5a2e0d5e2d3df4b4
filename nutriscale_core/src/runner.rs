//! Runs one blocking scan stage on a worker thread, bounded by a timeout and
//! a cancel token.
//!
//! On cancel or timeout the stage's `AbortSignal` is raised and the worker is
//! left to finish on its own; its late result is discarded. Devices observe
//! the signal and return early, so the lock a worker holds is released soon
//! after its stage is abandoned.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use crossbeam_channel as xch;
use nutriscale_traits::AbortSignal;

use crate::cancel::CancelToken;

/// How a stage ended.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Done(T),
    Cancelled,
    TimedOut,
    /// The worker panicked or could not be spawned.
    Died(String),
}

/// Run `work` on a named worker thread and wait for the first of: its
/// result, `cancel`, or `timeout`.
pub fn run_stage<T, F>(
    name: &'static str,
    timeout: Duration,
    cancel: &CancelToken,
    work: F,
) -> StageOutcome<T>
where
    T: Send + 'static,
    F: FnOnce(&AbortSignal) -> T + Send + 'static,
{
    if cancel.is_cancelled() {
        return StageOutcome::Cancelled;
    }
    let abort = AbortSignal::new();
    let worker_abort = abort.clone();
    let (tx, rx) = xch::bounded(1);
    let spawned = std::thread::Builder::new()
        .name(format!("scan-{name}"))
        .spawn(move || {
            let out = work(&worker_abort);
            // Receiver is gone if the stage was abandoned.
            let _ = tx.send(out);
        });
    if let Err(e) = spawned {
        tracing::error!(stage = name, error = %e, "failed to spawn stage worker");
        return StageOutcome::Died(format!("spawn {name} worker: {e}"));
    }

    let deadline = xch::after(timeout);
    xch::select! {
        recv(rx) -> msg => match msg {
            Ok(v) => StageOutcome::Done(v),
            Err(_) => {
                tracing::error!(stage = name, "stage worker exited without a result");
                StageOutcome::Died(format!("{name} worker panicked"))
            }
        },
        recv(cancel.receiver()) -> _ => {
            abort.raise();
            tracing::debug!(stage = name, "stage cancelled");
            StageOutcome::Cancelled
        },
        recv(deadline) -> _ => {
            abort.raise();
            tracing::warn!(stage = name, timeout_ms = timeout.as_millis() as u64, "stage timed out");
            StageOutcome::TimedOut
        },
    }
}

/// Lock a shared device from a stage worker. Polls instead of blocking so a
/// worker whose stage was abandoned gives up rather than queueing behind the
/// previous holder. `None` once `abort` is raised.
pub fn lock_unless_aborted<'a, T: ?Sized>(
    device: &'a Mutex<T>,
    abort: &AbortSignal,
) -> Option<MutexGuard<'a, T>> {
    let mut waited = false;
    loop {
        match device.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(p)) => return Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if abort.is_raised() {
                    return None;
                }
                if !waited {
                    tracing::debug!("device busy with an earlier stage; waiting");
                    waited = true;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

/// Wait `d` unless cancelled first. Returns `false` when cancelled.
pub fn sleep_unless_cancelled(d: Duration, cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if d.is_zero() {
        return true;
    }
    xch::select! {
        recv(cancel.receiver()) -> _ => false,
        recv(xch::after(d)) -> _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn returns_worker_result() {
        let c = CancelToken::new();
        let out = run_stage("unit", Duration::from_secs(1), &c, |_| 7);
        assert!(matches!(out, StageOutcome::Done(7)));
    }

    #[test]
    fn times_out_and_raises_abort() {
        let c = CancelToken::new();
        let (seen_tx, seen_rx) = xch::bounded(1);
        let out = run_stage("slow", Duration::from_millis(20), &c, move |abort| {
            while !abort.is_raised() {
                std::thread::sleep(Duration::from_millis(1));
            }
            let _ = seen_tx.send(());
        });
        assert!(matches!(out, StageOutcome::TimedOut));
        assert!(seen_rx.recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn panicking_worker_is_reported() {
        let c = CancelToken::new();
        let out: StageOutcome<()> = run_stage("boom", Duration::from_secs(1), &c, |_| panic!("boom"));
        assert!(matches!(out, StageOutcome::Died(_)));
    }

    #[test]
    fn already_cancelled_skips_the_worker() {
        let c = CancelToken::new();
        c.cancel();
        let out = run_stage("skip", Duration::from_secs(1), &c, |_| 1);
        assert!(matches!(out, StageOutcome::Cancelled));
    }

    #[test]
    fn lock_waits_for_holder_then_gives_up_on_abort() {
        let device = std::sync::Arc::new(Mutex::new(0_u32));
        let abort = AbortSignal::new();
        {
            let _held = device.lock().unwrap();
            let (d, a) = (device.clone(), abort.clone());
            let waiter = std::thread::spawn(move || lock_unless_aborted(&*d, &a).is_some());
            std::thread::sleep(Duration::from_millis(10));
            abort.raise();
            assert!(!waiter.join().unwrap());
        }
        assert!(lock_unless_aborted(&*device, &AbortSignal::new()).is_some());
    }

    #[test]
    fn sleep_wakes_on_cancel() {
        let c = CancelToken::new();
        let c2 = c.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            c2.cancel();
        });
        let start = Instant::now();
        assert!(!sleep_unless_cancelled(Duration::from_secs(10), &c));
        assert!(start.elapsed() < Duration::from_secs(5));
        t.join().unwrap();
        assert!(sleep_unless_cancelled(Duration::ZERO, &CancelToken::new()));
    }
}
