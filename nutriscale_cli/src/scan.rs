//! The `scan` command: assemble the pipeline, run one session, present it.

use std::time::Duration;

use crossbeam_channel as xch;
use nutriscale_config::Config;
use nutriscale_core::bmi::{self, BmiAssessment};
use nutriscale_core::{
    ScanCfg, ScanError, ScanErrorKind, ScanEvent, ScanOrchestrator, ScanSession, ScanState,
    ScanStatus,
};
use serde_json::json;

use crate::app::{load_foods, open_camera, open_classifier, start_acquirer, wait_for_sample};

/// Body measurements for an optional BMI line.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub height_cm: f64,
    pub weight_kg: f64,
    pub age: u32,
}

pub fn run_scan(cfg: &Config, body: Option<Body>, json: bool) -> eyre::Result<()> {
    // Validate body input before touching any device.
    let assessment = body
        .map(|b| bmi::assess(b.weight_kg, b.height_cm, b.age))
        .transpose()?;

    let mut acq = start_acquirer(cfg);
    if !wait_for_sample(&acq, Duration::from_millis(cfg.sampling.read_timeout_ms.max(250).saturating_mul(4))) {
        tracing::warn!("no weight sample yet; scanning with the last known weight");
    }
    let (camera, _kind) = open_camera(cfg)?;
    let classifier = open_classifier(cfg)?;
    let foods = load_foods(cfg)?;

    let (tx, rx) = xch::bounded::<ScanEvent>(32);
    let orchestrator = ScanOrchestrator::builder()
        .with_weight(acq.handle())
        .with_camera(camera)
        .with_classifier(classifier)
        .with_foods(foods)
        .with_config(ScanCfg::from(&cfg.scan))
        .with_events(tx)
        .build()?;

    let printer = std::thread::Builder::new()
        .name("scan-events".into())
        .spawn(move || {
            for ev in rx {
                if !json && !ev.state.is_terminal() {
                    eprintln!("  .. {}", ev.state);
                }
            }
        })?;

    let session = {
        let active = orchestrator.begin()?;
        let cancel = active.canceller();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
        active.run()
    };
    // Drops the event sender so the printer thread ends.
    drop(orchestrator);
    let _ = printer.join();
    acq.stop();

    if json {
        println!("{}", session_json(&session, assessment.as_ref()));
    } else {
        print_session(&session, assessment.as_ref());
    }

    match session.error {
        Some(err) if session.state == ScanState::Error => Err(eyre::Report::new(err)),
        _ => Ok(()),
    }
}

fn status_name(session: &ScanSession) -> String {
    session
        .status()
        .map_or_else(|| session.state.to_string(), |s| s.to_string())
}

pub fn session_json(session: &ScanSession, bmi: Option<&BmiAssessment>) -> serde_json::Value {
    let mut v = serde_json::to_value(session).unwrap_or_else(|_| json!({ "id": session.id }));
    if let Some(obj) = v.as_object_mut() {
        obj.insert("status".into(), json!(status_name(session)));
        obj.insert(
            "bmi".into(),
            bmi.map_or(serde_json::Value::Null, |b| json!(b)),
        );
    }
    v
}

fn print_session(session: &ScanSession, bmi: Option<&BmiAssessment>) {
    println!("Scan #{}: {} ({})", session.id, session.state, status_name(session));
    if session.below_threshold {
        println!(
            "Weight: {} g (below minimum; nutrition scaled for {} g)",
            session.measured_grams, session.scaled_grams
        );
    } else {
        println!("Weight: {} g", session.measured_grams);
    }

    match session.status() {
        Some(ScanStatus::Success | ScanStatus::NutritionMissing) => {
            if let Some(r) = &session.recognition {
                println!("Food: {} ({:.0}% confident)", r.label, r.confidence * 100.0);
            }
            match &session.nutrition {
                Some(n) => {
                    println!("  {} for {} g", n.name, n.weight_grams);
                    println!("  Calories: {:.1} kcal", n.macros.calories);
                    println!("  Protein:  {:.1} g", n.macros.protein_g);
                    println!("  Carbs:    {:.1} g", n.macros.carb_g);
                    println!("  Fat:      {:.1} g", n.macros.fat_g);
                }
                None => println!("  No nutrition data for this food."),
            }
        }
        Some(ScanStatus::NotRecognized) => {
            println!("Food not recognized.");
            if let Some(top) = session.candidates.first() {
                println!(
                    "  Best guess: {} ({:.0}%)",
                    top.label,
                    top.confidence * 100.0
                );
            }
        }
        Some(ScanStatus::Failed(_)) | None => {
            if let Some(ScanError { kind, message }) = &session.error {
                println!("Scan failed ({kind}): {message}");
            }
        }
    }

    if let Some(b) = bmi {
        let flag = if b.warning { "  [!]" } else { "" };
        println!("BMI: {:.2} ({}){flag}", b.bmi, b.category);
    }
}

/// Exit code for a scan that ended in `ERROR`.
pub fn exit_code_for_kind(kind: ScanErrorKind) -> u8 {
    match kind {
        ScanErrorKind::CaptureFailed => 3,
        ScanErrorKind::Timeout => 4,
        ScanErrorKind::Cancelled => 5,
        ScanErrorKind::InferenceFailed => 6,
        ScanErrorKind::ComputeFailed => 7,
    }
}
