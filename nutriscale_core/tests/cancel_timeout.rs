use nutriscale_core::mocks::{
    CaptureBehavior, FixedWeight, MockCamera, MockClassifier, PlatterSource, StaticFoods,
};
use nutriscale_core::{
    CalibrationState, SamplingCfg, ScanCfg, ScanErrorKind, ScanOrchestrator, ScanState,
    ScanStatus, WeightAcquirer,
};
use nutriscale_traits::Candidate;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn foods() -> Arc<StaticFoods> {
    Arc::new(StaticFoods::new().with("rice", 120.0, 2.5, 26.0, 0.3))
}

fn hanging_camera() -> MockCamera {
    MockCamera::new(CaptureBehavior::HangUntilAborted)
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn cancel_mid_capture_ends_in_cancelled_and_sampling_continues() {
    let platter = PlatterSource::new(2_100);
    let acq = WeightAcquirer::from_source(
        platter.clone(),
        SamplingCfg {
            sample_rate_hz: 500,
            read_timeout_ms: 20,
            ..SamplingCfg::default()
        },
        CalibrationState::new(0, 21.0).unwrap(),
    );
    wait_until(|| acq.read_weight().grams == 100);

    let camera = hanging_camera();
    let orch = ScanOrchestrator::builder()
        .with_weight(acq.handle())
        .with_camera(camera.clone())
        .with_classifier(MockClassifier::Candidates(vec![Candidate::new("rice", 0.9)]))
        .with_foods(foods())
        .with_config(ScanCfg {
            capture_timeout_ms: 10_000,
            ..ScanCfg::default()
        })
        .build()
        .unwrap();

    let active = orch.begin().unwrap();
    let cancel = active.canceller();
    let canceller = std::thread::spawn({
        let camera = camera.clone();
        move || {
            wait_until(|| camera.captures() == 1);
            cancel.cancel();
        }
    });

    let started = Instant::now();
    let s = active.run();
    canceller.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(s.state, ScanState::Error);
    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Cancelled)));
    assert_eq!(
        s.path(),
        vec![
            ScanState::Idle,
            ScanState::Weighing,
            ScanState::Capturing,
            ScanState::Error
        ]
    );
    // The capture worker saw its abort signal.
    wait_until(|| camera.saw_abort());

    // Sampling is untouched by the cancelled scan.
    assert!(acq.is_running());
    platter.set_raw(4_200);
    wait_until(|| acq.read_weight().grams == 200);
    assert!(!orch.is_busy());
}

#[test]
fn capture_timeout_is_reported_and_next_scan_still_works() {
    let camera = hanging_camera();
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(camera.clone())
        .with_classifier(MockClassifier::Candidates(vec![Candidate::new("rice", 0.9)]))
        .with_foods(foods())
        .with_config(ScanCfg {
            capture_timeout_ms: 30,
            ..ScanCfg::default()
        })
        .build()
        .unwrap();

    let s = orch.scan().unwrap();
    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Timeout)));
    assert!(s.error.unwrap().message.contains("30 ms"));
    wait_until(|| camera.saw_abort());

    // The abandoned worker has released the camera; the next capture runs too.
    let s2 = orch.scan().unwrap();
    assert_eq!(s2.status(), Some(ScanStatus::Failed(ScanErrorKind::Timeout)));
    wait_until(|| camera.captures() == 2);
}

#[test]
fn inference_timeout_is_reported() {
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(4, 4)))
        .with_classifier(MockClassifier::Slow(Duration::from_millis(500)))
        .with_foods(foods())
        .with_config(ScanCfg {
            inference_timeout_ms: 20,
            ..ScanCfg::default()
        })
        .build()
        .unwrap();
    let started = Instant::now();
    let s = orch.scan().unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Timeout)));
    assert_eq!(s.path().last().copied(), Some(ScanState::Error));
    assert!(s.path().contains(&ScanState::Recognizing));
}

#[test]
fn cancel_while_settling_stops_before_capture() {
    let camera = MockCamera::new(CaptureBehavior::Frame(4, 4));
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(camera.clone())
        .with_classifier(MockClassifier::Candidates(vec![Candidate::new("rice", 0.9)]))
        .with_foods(foods())
        .with_config(ScanCfg {
            settle_ms: 10_000,
            ..ScanCfg::default()
        })
        .build()
        .unwrap();

    let active = orch.begin().unwrap();
    let cancel = active.canceller();
    let t = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        cancel.cancel();
    });
    let s = active.run();
    t.join().unwrap();

    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Cancelled)));
    assert_eq!(s.path().last(), Some(&ScanState::Error));
    assert!(!s.path().contains(&ScanState::Capturing));
    assert_eq!(camera.captures(), 0);
}

#[test]
fn cancel_before_run_never_touches_the_camera() {
    let camera = MockCamera::new(CaptureBehavior::Frame(4, 4));
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(camera.clone())
        .with_classifier(MockClassifier::Candidates(vec![Candidate::new("rice", 0.9)]))
        .with_foods(foods())
        .build()
        .unwrap();
    let active = orch.begin().unwrap();
    active.canceller().cancel();
    let s = active.run();
    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Cancelled)));
    assert_eq!(camera.captures(), 0);
}

#[test]
fn cancel_mid_recognition_leaves_the_classifier_usable() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(4, 4)))
        .with_classifier(MockClassifier::Slow(Duration::from_millis(250)))
        .with_foods(foods())
        .with_config(ScanCfg {
            inference_timeout_ms: 350,
            ..ScanCfg::default()
        })
        .with_events(tx)
        .build()
        .unwrap();

    let active = orch.begin().unwrap();
    let cancel = active.canceller();
    let canceller = std::thread::spawn(move || {
        while let Ok(ev) = rx.recv_timeout(Duration::from_secs(2)) {
            if ev.state == ScanState::Recognizing {
                std::thread::sleep(Duration::from_millis(30));
                cancel.cancel();
                return;
            }
        }
        panic!("scan never reached RECOGNIZING");
    });
    let s = active.run();
    canceller.join().unwrap();
    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Cancelled)));
    assert!(s.path().ends_with(&[ScanState::Recognizing, ScanState::Error]));

    // The abandoned inference gives the classifier back; the next scan gets
    // its full budget.
    let s2 = orch.scan().unwrap();
    assert_eq!(s2.status(), Some(ScanStatus::NotRecognized));
    assert_eq!(s2.path().last(), Some(&ScanState::Result));
}
