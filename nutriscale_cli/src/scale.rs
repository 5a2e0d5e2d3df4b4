//! `weigh`, `tare` and `calibrate`.

use std::path::Path;
use std::time::Duration;

use nutriscale_config::Config;
use nutriscale_core::{AcquireMode, ScaleError, WeightAcquirer};
use serde_json::json;

use crate::app::{mode_name, start_acquirer, wait_for_sample};
use crate::persist::save_calibration;

/// How long to wait for the first reading after the sampler starts.
fn first_sample_limit(cfg: &Config) -> Duration {
    Duration::from_millis(cfg.sampling.read_timeout_ms.saturating_mul(4).max(500))
}

fn ready_acquirer(cfg: &Config) -> eyre::Result<WeightAcquirer> {
    let acq = start_acquirer(cfg);
    if !wait_for_sample(&acq, first_sample_limit(cfg)) {
        return Err(eyre::Report::new(ScaleError::Timeout).wrap_err("no reading from the load cell"));
    }
    Ok(acq)
}

pub fn weigh(cfg: &Config, count: u32, interval_ms: u64, json: bool) -> eyre::Result<()> {
    let mut acq = ready_acquirer(cfg)?;
    let count = count.max(1);
    for i in 0..count {
        if i > 0 {
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
        let w = acq.read_weight();
        if json {
            println!(
                "{}",
                json!({
                    "grams": w.grams,
                    "mode": mode_name(w.mode),
                    "overloaded": w.overloaded,
                    "stalled_ms": acq.stalled_for_ms(),
                })
            );
        } else if w.overloaded {
            println!("{} g (over capacity)", w.grams);
        } else {
            println!("{} g", w.grams);
        }
    }
    acq.stop();
    Ok(())
}

pub fn tare(cfg: &Config, save: Option<&Path>, json: bool) -> eyre::Result<()> {
    let mut acq = ready_acquirer(cfg)?;
    let state = acq.tare()?;
    if let Some(p) = save {
        save_calibration(p, &state)?;
    }
    acq.stop();
    if json {
        println!(
            "{}",
            json!({
                "offset": state.offset,
                "gain": state.gain,
                "mode": mode_name(acq.mode()),
                "saved": save.map(|p| p.display().to_string()),
            })
        );
    } else {
        println!("Tare complete: offset={}", state.offset);
    }
    Ok(())
}

pub fn calibrate(
    cfg: &Config,
    grams: f32,
    place_ms: u64,
    save: Option<&Path>,
    json: bool,
) -> eyre::Result<()> {
    if !(grams.is_finite() && grams > 0.0) {
        return Err(eyre::Report::new(ScaleError::InvalidReference(grams)));
    }
    let mut acq = ready_acquirer(cfg)?;
    acq.tare()?;
    if acq.mode() == AcquireMode::Hardware {
        if !json {
            println!(
                "Place the {grams} g reference on the scale ({:.1} s)...",
                place_ms as f64 / 1000.0
            );
        }
        std::thread::sleep(Duration::from_millis(place_ms));
    }
    acq.calibrate(grams)?;
    let state = acq.calibration();
    if let Some(p) = save {
        save_calibration(p, &state)?;
    }
    acq.stop();
    if json {
        println!(
            "{}",
            json!({
                "offset": state.offset,
                "gain": state.gain,
                "reference_g": grams,
                "mode": mode_name(acq.mode()),
                "saved": save.map(|p| p.display().to_string()),
            })
        );
    } else {
        println!(
            "Calibration complete: offset={} gain={:.3} counts/g",
            state.offset, state.gain
        );
    }
    Ok(())
}
