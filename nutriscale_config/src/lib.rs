#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema, persisted calibration and data-file loaders for the scale.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Only `[pins]` is mandatory; every other section has working defaults.
//! - The food table and classifier labels are plain data files referenced
//!   from the config.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub mod foods;

pub use foods::{FoodDatabase, FoodEntry};

/// Labels used by the simulated classifier when no label file is configured.
pub const DEFAULT_LABELS: [&str; 3] = ["rice", "grilled_chicken", "omelette"];

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    /// Clock pulses per read: 25 (channel A, gain 128), 26 (B, 32), 27 (A, 64).
    #[serde(default = "default_gain_pulses")]
    pub hx711_gain_pulses: u8,
}

fn default_gain_pulses() -> u8 {
    25
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sampling {
    pub sample_rate_hz: u32,
    /// Max wait for one conversion (ms).
    pub read_timeout_ms: u64,
    /// Rolling median length applied on read (1 disables).
    pub window: usize,
    /// Samples averaged by tare and calibrate.
    pub burst_samples: usize,
    /// Give up on a tare/calibrate burst after this long (ms).
    pub burst_timeout_ms: u64,
    /// Data-ready probe when opening the load cell (ms).
    pub probe_timeout_ms: u64,
    /// Readings above this are flagged as overloaded.
    pub max_weight_kg: f32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            sample_rate_hz: 20,
            read_timeout_ms: 150,
            window: 5,
            burst_samples: 10,
            burst_timeout_ms: 3000,
            probe_timeout_ms: 2000,
            max_weight_kg: 5.0,
        }
    }
}

/// Calibration values as stored on disk.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PersistedCalibration {
    /// Raw counts at zero grams.
    pub offset: i32,
    /// Raw counts per gram.
    pub gain: f32,
}

impl Default for PersistedCalibration {
    fn default() -> Self {
        Self {
            offset: 0,
            gain: 210.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CalibrationFile {
    calibration: PersistedCalibration,
}

impl PersistedCalibration {
    /// Render as a standalone TOML document with a `[calibration]` table.
    pub fn to_toml_string(&self) -> eyre::Result<String> {
        toml::to_string(&CalibrationFile { calibration: *self })
            .map_err(|e| eyre::eyre!("serialize calibration: {e}"))
    }
}

/// Load a calibration file written by `PersistedCalibration::to_toml_string`.
pub fn load_calibration_toml(path: &Path) -> eyre::Result<PersistedCalibration> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read calibration {}: {e}", path.display()))?;
    let file: CalibrationFile =
        toml::from_str(&text).map_err(|e| eyre::eyre!("parse calibration {}: {e}", path.display()))?;
    validate_calibration(&file.calibration)?;
    Ok(file.calibration)
}

fn validate_calibration(c: &PersistedCalibration) -> eyre::Result<()> {
    if !c.gain.is_finite() || c.gain == 0.0 {
        eyre::bail!("calibration.gain must be finite and non-zero");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scan {
    /// Minimum top-1 confidence to accept a recognition.
    pub confidence_threshold: f32,
    /// Below this a plate counts as "not enough weight" for the caller.
    pub min_weight_threshold_g: u32,
    /// Nutrition is never scaled for less than this weight.
    pub min_weight_floor_g: u32,
    pub top_k: usize,
    /// Wait before taking the weight reading (ms).
    pub settle_ms: u64,
    pub capture_timeout_ms: u64,
    pub inference_timeout_ms: u64,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            min_weight_threshold_g: 10,
            min_weight_floor_g: 100,
            top_k: 3,
            settle_ms: 0,
            capture_timeout_ms: 5000,
            inference_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    #[default]
    Auto,
    Cli,
    Simulated,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraCfg {
    pub backend: CameraBackend,
    pub width: u32,
    pub height: u32,
    /// Counter-clockwise degrees: 0, 90, 180 or 270.
    pub rotation: u16,
    pub warmup_ms: u64,
    /// Temp file for the still capture; defaults to the OS temp dir.
    pub capture_path: Option<PathBuf>,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Auto,
            width: 640,
            height: 480,
            rotation: 0,
            warmup_ms: 200,
            capture_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClassifierCfg {
    /// One label per line, in model output order.
    pub labels: Option<PathBuf>,
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Confidence reported by the simulated classifier.
    pub simulated_confidence: f32,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self {
            labels: None,
            input_size: 224,
            simulated_confidence: 0.85,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FoodsCfg {
    pub path: PathBuf,
}

impl Default for FoodsCfg {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/foods.json"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub sampling: Sampling,
    #[serde(default)]
    pub calibration: PersistedCalibration,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub camera: CameraCfg,
    #[serde(default)]
    pub classifier: ClassifierCfg,
    #[serde(default)]
    pub foods: FoodsCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read a label file: one label per line, blank lines ignored.
pub fn load_labels(path: &Path) -> eyre::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read labels {}: {e}", path.display()))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        eyre::bail!("label file {} has no labels", path.display());
    }
    Ok(labels)
}

impl Config {
    /// Labels from `classifier.labels`, or the built-in list.
    pub fn labels(&self) -> eyre::Result<Vec<String>> {
        match &self.classifier.labels {
            Some(p) => load_labels(p),
            None => Ok(DEFAULT_LABELS.iter().map(|s| (*s).to_string()).collect()),
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        if !(25..=27).contains(&self.pins.hx711_gain_pulses) {
            eyre::bail!("pins.hx711_gain_pulses must be 25, 26 or 27");
        }
        if self.pins.hx711_dt == self.pins.hx711_sck {
            eyre::bail!("pins.hx711_dt and pins.hx711_sck must differ");
        }

        // Sampling
        if self.sampling.sample_rate_hz == 0 {
            eyre::bail!("sampling.sample_rate_hz must be > 0");
        }
        if self.sampling.sample_rate_hz > 1000 {
            eyre::bail!("sampling.sample_rate_hz is unreasonably large (>1000)");
        }
        if self.sampling.read_timeout_ms == 0 {
            eyre::bail!("sampling.read_timeout_ms must be >= 1");
        }
        if self.sampling.window == 0 {
            eyre::bail!("sampling.window must be >= 1");
        }
        if self.sampling.burst_samples == 0 {
            eyre::bail!("sampling.burst_samples must be >= 1");
        }
        if self.sampling.burst_timeout_ms == 0 {
            eyre::bail!("sampling.burst_timeout_ms must be >= 1");
        }
        if self.sampling.probe_timeout_ms == 0 {
            eyre::bail!("sampling.probe_timeout_ms must be >= 1");
        }
        if !(self.sampling.max_weight_kg.is_finite() && self.sampling.max_weight_kg > 0.0) {
            eyre::bail!("sampling.max_weight_kg must be > 0");
        }

        // Calibration
        validate_calibration(&self.calibration)?;

        // Scan
        if !(0.0..=1.0).contains(&self.scan.confidence_threshold) {
            eyre::bail!("scan.confidence_threshold must be in [0.0, 1.0]");
        }
        if self.scan.top_k == 0 {
            eyre::bail!("scan.top_k must be >= 1");
        }
        if self.scan.capture_timeout_ms == 0 {
            eyre::bail!("scan.capture_timeout_ms must be >= 1");
        }
        if self.scan.inference_timeout_ms == 0 {
            eyre::bail!("scan.inference_timeout_ms must be >= 1");
        }
        if self.scan.settle_ms > 60_000 {
            eyre::bail!("scan.settle_ms is unreasonably large (>60s)");
        }

        // Camera
        if self.camera.width == 0 || self.camera.height == 0 {
            eyre::bail!("camera.width and camera.height must be > 0");
        }
        if ![0, 90, 180, 270].contains(&self.camera.rotation) {
            eyre::bail!("camera.rotation must be one of 0, 90, 180, 270");
        }

        // Classifier
        if self.classifier.input_size == 0 {
            eyre::bail!("classifier.input_size must be > 0");
        }
        if !(0.0..=1.0).contains(&self.classifier.simulated_confidence) {
            eyre::bail!("classifier.simulated_confidence must be in [0.0, 1.0]");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
