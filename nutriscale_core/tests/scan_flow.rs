use crossbeam_channel as xch;
use nutriscale_core::mocks::{CaptureBehavior, FixedWeight, MockCamera, MockClassifier, StaticFoods};
use nutriscale_core::{
    ScanCfg, ScanErrorKind, ScanOrchestrator, ScanRejected, ScanState, ScanStatus,
};
use nutriscale_traits::Candidate;
use rstest::rstest;
use std::sync::Arc;

fn foods() -> Arc<StaticFoods> {
    Arc::new(
        StaticFoods::new()
            .with("rice", 120.0, 2.5, 26.0, 0.3)
            .with("omelette", 154.0, 11.0, 0.6, 12.0),
    )
}

fn orchestrator(grams: u32, classifier: MockClassifier) -> ScanOrchestrator {
    ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(grams))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(8, 6)))
        .with_classifier(classifier)
        .with_foods(foods())
        .build()
        .unwrap()
}

fn ranked(items: &[(&str, f32)]) -> MockClassifier {
    MockClassifier::Candidates(items.iter().map(|(l, c)| Candidate::new(*l, *c)).collect())
}

#[test]
fn successful_scan_walks_every_state() {
    let orch = orchestrator(180, ranked(&[("rice", 0.92), ("omelette", 0.05)]));
    let s = orch.scan().unwrap();

    assert_eq!(s.status(), Some(ScanStatus::Success));
    assert_eq!(
        s.path(),
        vec![
            ScanState::Idle,
            ScanState::Weighing,
            ScanState::Capturing,
            ScanState::Recognizing,
            ScanState::Computing,
            ScanState::Result,
        ]
    );
    assert!(s.transitions.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
    assert_eq!(s.measured_grams, 180);
    assert_eq!(s.scaled_grams, 180);
    assert!(!s.below_threshold);
    assert!(s.image.is_some());
    assert!(s.error.is_none());

    let r = s.recognition.as_ref().unwrap();
    assert_eq!(r.label, "rice");
    assert_eq!(r.runners_up.len(), 1);

    let n = s.nutrition.as_ref().unwrap();
    assert_eq!(n.weight_grams, 180);
    assert!((n.macros.calories - 216.0).abs() < 1e-9);
    assert!((n.macros.protein_g - 4.5).abs() < 1e-9);
    assert!((n.macros.carb_g - 46.8).abs() < 1e-9);
    assert!((n.macros.fat_g - 0.5).abs() < 1e-9);
}

#[rstest]
#[case(&[("rice", 0.69)])]
#[case(&[("rice", 0.4), ("omelette", 0.3)])]
#[case(&[])]
#[case(&[("rice", f32::NAN)])]
fn low_confidence_is_not_recognized_not_error(#[case] items: &[(&str, f32)]) {
    let orch = orchestrator(200, ranked(items));
    let s = orch.scan().unwrap();
    assert_eq!(s.state, ScanState::Result);
    assert_eq!(s.status(), Some(ScanStatus::NotRecognized));
    assert!(s.recognition.is_none());
    assert!(s.nutrition.is_none());
    assert!(s.error.is_none());
    assert!(!s.path().contains(&ScanState::Computing));
}

#[test]
fn not_recognized_keeps_candidates() {
    let orch = orchestrator(200, ranked(&[("omelette", 0.2), ("rice", 0.5)]));
    let s = orch.scan().unwrap();
    let labels: Vec<&str> = s.candidates.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["rice", "omelette"]);
}

#[test]
fn unknown_label_is_nutrition_missing() {
    let orch = orchestrator(150, ranked(&[("pizza", 0.95)]));
    let s = orch.scan().unwrap();
    assert_eq!(s.state, ScanState::Result);
    assert_eq!(s.status(), Some(ScanStatus::NutritionMissing));
    assert_eq!(s.recognition.as_ref().unwrap().label, "pizza");
    assert!(s.nutrition.is_none());
}

#[test]
fn light_plate_scales_with_floor_and_is_flagged() {
    let orch = orchestrator(4, ranked(&[("rice", 0.9)]));
    let check = orch.check_weight();
    assert!(check.below_threshold);
    assert_eq!(check.scaled_grams, 100);

    let s = orch.scan().unwrap();
    assert_eq!(s.measured_grams, 4);
    assert_eq!(s.scaled_grams, 100);
    assert!(s.below_threshold);
    let n = s.nutrition.unwrap();
    assert_eq!(n.weight_grams, 100);
    assert!((n.macros.calories - 120.0).abs() < 1e-9);
}

#[test]
fn weight_between_threshold_and_floor_is_not_flagged() {
    let orch = orchestrator(50, ranked(&[("rice", 0.9)]));
    let s = orch.scan().unwrap();
    assert!(!s.below_threshold);
    assert_eq!(s.scaled_grams, 100);
}

#[test]
fn capture_failure_routes_to_error() {
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(MockCamera::new(CaptureBehavior::Fail("no camera".into())))
        .with_classifier(ranked(&[("rice", 0.9)]))
        .with_foods(foods())
        .build()
        .unwrap();
    let s = orch.scan().unwrap();
    assert_eq!(s.state, ScanState::Error);
    assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::CaptureFailed)));
    let err = s.error.unwrap();
    assert!(err.message.contains("no camera"), "{}", err.message);
    assert!(s.image.is_none());
}

#[test]
fn classifier_error_is_inference_failed() {
    let orch = orchestrator(200, MockClassifier::Fail("tensor shape mismatch".into()));
    let s = orch.scan().unwrap();
    assert_eq!(
        s.status(),
        Some(ScanStatus::Failed(ScanErrorKind::InferenceFailed))
    );
    assert!(s.image.is_some());
}

#[test]
fn negative_table_values_are_compute_failed() {
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(200))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(4, 4)))
        .with_classifier(ranked(&[("broken", 0.9)]))
        .with_foods(Arc::new(StaticFoods::new().with("broken", -5.0, 1.0, 1.0, 1.0)))
        .build()
        .unwrap();
    let s = orch.scan().unwrap();
    assert_eq!(
        s.status(),
        Some(ScanStatus::Failed(ScanErrorKind::ComputeFailed))
    );
    assert_eq!(s.path().last(), Some(&ScanState::Error));
    assert!(s.path().contains(&ScanState::Computing));
}

#[test]
fn second_scan_is_rejected_while_one_is_active() {
    let orch = orchestrator(200, ranked(&[("rice", 0.9)]));
    let active = orch.begin().unwrap();
    assert!(orch.is_busy());
    assert_eq!(orch.begin().err(), Some(ScanRejected::Busy));
    assert_eq!(orch.scan().err(), Some(ScanRejected::Busy));

    let s = active.run();
    assert_eq!(s.status(), Some(ScanStatus::Success));
    assert!(!orch.is_busy());

    let again = orch.scan().unwrap();
    assert!(again.id > s.id);
}

#[test]
fn dropping_an_unrun_scan_releases_the_slot() {
    let orch = orchestrator(200, ranked(&[("rice", 0.9)]));
    drop(orch.begin().unwrap());
    assert!(orch.begin().is_ok());
}

#[test]
fn events_mirror_transitions_and_end_with_status() {
    let (tx, rx) = xch::unbounded();
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(120))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(4, 4)))
        .with_classifier(ranked(&[("omelette", 0.8)]))
        .with_foods(foods())
        .with_events(tx)
        .build()
        .unwrap();
    let s = orch.scan().unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    let states: Vec<ScanState> = events.iter().map(|e| e.state).collect();
    assert_eq!(&states[..], &s.path()[1..]);
    assert!(events.iter().all(|e| e.session_id == s.id));
    assert!(events[..events.len() - 1].iter().all(|e| e.status.is_none()));
    assert_eq!(events.last().unwrap().status, Some(ScanStatus::Success));
}

#[test]
fn full_event_channel_does_not_block_the_scan() {
    let (tx, _rx) = xch::bounded(1);
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(120))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(4, 4)))
        .with_classifier(ranked(&[("omelette", 0.8)]))
        .with_foods(foods())
        .with_events(tx)
        .build()
        .unwrap();
    assert_eq!(orch.scan().unwrap().status(), Some(ScanStatus::Success));
}

#[test]
fn top_k_limits_candidates() {
    let orch = ScanOrchestrator::builder()
        .with_weight(FixedWeight::new(120))
        .with_camera(MockCamera::new(CaptureBehavior::Frame(4, 4)))
        .with_classifier(ranked(&[("a", 0.1), ("b", 0.2), ("c", 0.3), ("d", 0.4)]))
        .with_foods(foods())
        .with_config(ScanCfg {
            top_k: 2,
            ..ScanCfg::default()
        })
        .build()
        .unwrap();
    let s = orch.scan().unwrap();
    assert_eq!(s.candidates.len(), 2);
}
