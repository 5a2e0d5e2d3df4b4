//! Human-readable error descriptions and structured JSON error formatting.

use nutriscale_core::bmi::BmiError;
use nutriscale_core::{BuildError, ScaleError, ScanError, ScanErrorKind, ScanRejected};
use nutriscale_hardware::HwError;

use crate::scan::exit_code_for_kind;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(se) = err.downcast_ref::<ScanError>() {
        return match se.kind {
            ScanErrorKind::CaptureFailed => format!(
                "What happened: The camera did not deliver a picture ({}).\nLikely causes: Camera ribbon loose, camera in use by another process, or the capture tool failed.\nHow to fix: Check the camera connection, run `rpicam-still -o test.jpg` by hand, or set camera.backend = \"simulated\".",
                se.message
            ),
            ScanErrorKind::Timeout => format!(
                "What happened: A scan stage took too long ({}).\nLikely causes: Slow camera warm-up or a stalled classifier.\nHow to fix: Raise scan.capture_timeout_ms or scan.inference_timeout_ms in the config.",
                se.message
            ),
            ScanErrorKind::Cancelled => {
                "What happened: The scan was cancelled.\nLikely causes: Ctrl-C was pressed while scanning.\nHow to fix: Start a new scan.".to_string()
            }
            ScanErrorKind::InferenceFailed => format!(
                "What happened: Food recognition failed ({}).\nLikely causes: Classifier could not process the image.\nHow to fix: Re-run with --log-level=debug for details.",
                se.message
            ),
            ScanErrorKind::ComputeFailed => format!(
                "What happened: Nutrition could not be computed ({}).\nLikely causes: Negative or missing values in the food table.\nHow to fix: Fix the entry in the food table JSON.",
                se.message
            ),
        };
    }

    if let Some(ScanRejected::Busy) = err.downcast_ref::<ScanRejected>() {
        return "What happened: A scan is already in progress.\nLikely causes: A previous scan has not finished.\nHow to fix: Wait for the result, then scan again.".to_string();
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [scan] section.\nHow to fix: Edit the config file, then rerun."
            ),
            other => format!(
                "What happened: The scan pipeline could not be assembled ({other}).\nLikely causes: A device failed to initialize.\nHow to fix: Run `nutriscale self-check` to see which device is missing."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::Timeout => "What happened: Scale read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing sampling.read_timeout_ms in the config.".to_string(),
            ScaleError::BurstTimeout { got, wanted } => format!(
                "What happened: Only {got} of {wanted} readings arrived while averaging.\nLikely causes: Load cell stalls or sampling.burst_timeout_ms is too low.\nHow to fix: Check the wiring, or raise sampling.burst_timeout_ms."
            ),
            ScaleError::InvalidReference(g) => format!(
                "What happened: Reference weight {g} g is not usable.\nLikely causes: Zero, negative or missing --grams.\nHow to fix: Pass the mass of the reference weight, e.g. `nutriscale calibrate --grams 500`."
            ),
            ScaleError::DegenerateGain => "What happened: Calibration reading equals the tare reading.\nLikely causes: Reference weight was not on the scale in time.\nHow to fix: Place the weight sooner or raise --place-ms, then calibrate again.".to_string(),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(he) = err.downcast_ref::<HwError>() {
        if matches!(he, HwError::CameraUnavailable(_)) {
            return format!(
                "What happened: {he}.\nLikely causes: rpicam-still/libcamera-still is not installed or not on PATH.\nHow to fix: Install the camera tools, or set camera.backend = \"auto\" or \"simulated\"."
            );
        }
        return format!(
            "What happened: {he}.\nLikely causes: Device wiring or permissions.\nHow to fix: Run `nutriscale self-check` and check the logs."
        );
    }

    if let Some(be) = err.downcast_ref::<BmiError>() {
        return format!(
            "What happened: {be}.\nLikely causes: --height-cm or --body-kg is zero or negative.\nHow to fix: Pass positive body measurements."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with the path to nutriscale.toml."
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [pins] (hx711_dt, hx711_sck), or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("food table") {
        return format!(
            "What happened: The food table could not be loaded ({msg}).\nLikely causes: foods.path points to a missing or malformed JSON file.\nHow to fix: Check foods.path in the config and validate the JSON."
        );
    }

    if lower.contains("calibration") {
        return format!(
            "What happened: The calibration file is unusable ({msg}).\nLikely causes: Missing [calibration] table or gain of zero.\nHow to fix: Recreate it with `nutriscale calibrate --grams <G> --save <FILE>`."
        );
    }

    if lower.contains("label") {
        return format!(
            "What happened: Classifier labels could not be loaded ({msg}).\nLikely causes: classifier.labels points to a missing or empty file.\nHow to fix: Fix the path or remove it to use the built-in labels."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: scan failures by kind, then the other typed errors; 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    if let Some(se) = err.downcast_ref::<ScanError>() {
        return exit_code_for_kind(se.kind);
    }
    if err.downcast_ref::<ScanRejected>().is_some() {
        return 8;
    }
    if err.downcast_ref::<ScaleError>().is_some() {
        return 9;
    }
    1
}

fn reason_name(err: &eyre::Report) -> String {
    if let Some(se) = err.downcast_ref::<ScanError>() {
        return format!("{:?}", se.kind);
    }
    if err.downcast_ref::<ScanRejected>().is_some() {
        return "Busy".to_string();
    }
    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::HardwareUnavailable(_) => "HardwareUnavailable",
            ScaleError::Timeout => "Timeout",
            ScaleError::TransientIo(_) => "TransientIo",
            ScaleError::InvalidReference(_) => "InvalidReference",
            ScaleError::DegenerateGain => "DegenerateGain",
            ScaleError::BurstTimeout { .. } => "BurstTimeout",
            ScaleError::Stopped => "Stopped",
        }
        .to_string();
    }
    "Error".to_string()
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
