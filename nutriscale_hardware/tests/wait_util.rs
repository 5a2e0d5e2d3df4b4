use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};
use std::thread;
use std::time::Duration;

use nutriscale_hardware::error::HwError;
use nutriscale_hardware::util::{poll_until, wait_until_low_with_timeout};
use nutriscale_traits::AbortSignal;

#[test]
fn wait_until_low_success_path() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_low_timeout_path() {
    let high = Arc::new(AtomicBool::new(true));

    let err = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    assert!(matches!(err, HwError::DataReadyTimeout), "got {err:?}");
}

#[test]
fn poll_until_stops_on_abort() {
    let abort = AbortSignal::new();
    let raiser = abort.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        raiser.raise();
    });

    let err = poll_until(
        || Ok(false),
        Some(&abort),
        Duration::from_secs(5),
        Duration::from_millis(1),
    )
    .expect_err("expected abort");
    assert!(matches!(err, HwError::Aborted), "got {err:?}");
}

#[test]
fn poll_until_propagates_predicate_errors() {
    let calls = AtomicU32::new(0);
    let err = poll_until(
        || {
            if calls.fetch_add(1, Ordering::Relaxed) == 2 {
                Err(HwError::Capture("boom".into()))
            } else {
                Ok(false)
            }
        },
        None,
        Duration::from_secs(1),
        Duration::from_micros(100),
    )
    .expect_err("expected predicate error");
    assert!(matches!(err, HwError::Capture(_)));
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}
