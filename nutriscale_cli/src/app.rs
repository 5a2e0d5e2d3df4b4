//! Config loading and device assembly shared by all commands.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use nutriscale_config::{Config, FoodDatabase};
use nutriscale_core::{AcquireMode, CalibrationState, ModelClassifier, SamplingCfg, WeightAcquirer};
use nutriscale_hardware::{CameraKind, CameraSettings, Hx711Pins, SimulatedModel};
use nutriscale_traits::Camera;

/// Read, parse and validate the config. A `--calibration` file replaces the
/// config's `[calibration]` table.
pub fn load_config(path: &Path, calibration: Option<&Path>) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let mut cfg = nutriscale_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
    if let Some(p) = calibration {
        cfg.calibration = nutriscale_config::load_calibration_toml(p)?;
        tracing::debug!(file = %p.display(), "calibration loaded");
    }
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    Ok(cfg)
}

/// Start weight acquisition. Falls back to simulated when the load cell
/// cannot be opened.
pub fn start_acquirer(cfg: &Config) -> WeightAcquirer {
    let pins = Hx711Pins {
        dt: cfg.pins.hx711_dt,
        sck: cfg.pins.hx711_sck,
        gain_pulses: cfg.pins.hx711_gain_pulses,
    };
    let probe = Duration::from_millis(cfg.sampling.probe_timeout_ms);
    let sampling = SamplingCfg::from(&cfg.sampling);
    let calibration = CalibrationState::from(&cfg.calibration);
    WeightAcquirer::start(
        || nutriscale_hardware::open_hx711(&pins, probe),
        sampling,
        calibration,
    )
}

/// Block until the sampler has produced a reading, up to `limit`.
pub fn wait_for_sample(acq: &WeightAcquirer, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while !acq.has_sample() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    true
}

pub fn mode_name(mode: AcquireMode) -> &'static str {
    match mode {
        AcquireMode::Hardware => "hardware",
        AcquireMode::Simulated => "simulated",
    }
}

pub fn camera_settings(cfg: &Config) -> CameraSettings {
    let defaults = CameraSettings::default();
    CameraSettings {
        width: cfg.camera.width,
        height: cfg.camera.height,
        rotation: cfg.camera.rotation,
        warmup_ms: cfg.camera.warmup_ms,
        capture_path: cfg
            .camera
            .capture_path
            .clone()
            .unwrap_or(defaults.capture_path),
        max_capture: Duration::from_millis(cfg.scan.capture_timeout_ms),
    }
}

pub fn open_camera(cfg: &Config) -> eyre::Result<(Box<dyn Camera + Send>, CameraKind)> {
    use nutriscale_config::CameraBackend as Cfg;
    use nutriscale_hardware::CameraBackend as Hw;
    let backend = match cfg.camera.backend {
        Cfg::Auto => Hw::Auto,
        Cfg::Cli => Hw::Cli,
        Cfg::Simulated => Hw::Simulated,
    };
    let (camera, kind) = nutriscale_hardware::select_camera(backend, camera_settings(cfg))?;
    tracing::info!(camera = %camera_label(kind), "camera selected");
    Ok((camera, kind))
}

pub fn camera_label(kind: CameraKind) -> String {
    match kind {
        CameraKind::Cli(tool) => tool.to_string(),
        CameraKind::Simulated => "simulated".to_string(),
    }
}

/// Classifier over the simulated model, fed `classifier.input_size` tensors.
pub fn open_classifier(cfg: &Config) -> eyre::Result<ModelClassifier<SimulatedModel>> {
    let labels = cfg.labels()?;
    let model = SimulatedModel::new(labels.len(), cfg.classifier.simulated_confidence);
    tracing::info!(
        labels = labels.len(),
        input_size = cfg.classifier.input_size,
        "classifier ready (simulated model)"
    );
    Ok(ModelClassifier::new(model, labels, cfg.classifier.input_size))
}

pub fn load_foods(cfg: &Config) -> eyre::Result<Arc<FoodDatabase>> {
    let db = FoodDatabase::load(&cfg.foods.path)?;
    tracing::debug!(entries = db.len(), path = %cfg.foods.path.display(), "food table loaded");
    Ok(Arc::new(db))
}
