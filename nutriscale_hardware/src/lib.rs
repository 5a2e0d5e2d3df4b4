//! Device variants behind the `nutriscale_traits` seams.
//!
//! Each capability has a real backend and a simulated one. Real backends are
//! constructed through fallible `open`/`probe` calls so the caller can pick the
//! simulated variant once, at startup, when the device is missing.
pub mod camera;
pub mod classifier;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;
pub mod util;

pub use camera::{CameraSettings, CliCamera, SimulatedCamera};
pub use classifier::SimulatedModel;
pub use error::HwError;

use nutriscale_traits::{BoxError, Camera, SignalSource};
use std::time::Duration;

/// HX711 wiring.
#[derive(Debug, Clone, Copy)]
pub struct Hx711Pins {
    pub dt: u8,
    pub sck: u8,
    /// Total clock pulses per read: 25 (A/128), 26 (B/32) or 27 (A/64).
    pub gain_pulses: u8,
}

/// Load-cell stand-in returning a constant raw value.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSource {
    raw: i32,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: i32) -> Self {
        Self { raw }
    }
}

impl SignalSource for SimulatedSource {
    fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        Ok(self.raw)
    }
}

/// Open the HX711 on `pins`, probing for data-ready within `probe_timeout`.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open_hx711(
    pins: &Hx711Pins,
    probe_timeout: Duration,
) -> error::Result<Box<dyn SignalSource + Send>> {
    Ok(Box::new(hx711::Hx711Source::open(pins, probe_timeout)?))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open_hx711(
    _pins: &Hx711Pins,
    _probe_timeout: Duration,
) -> error::Result<Box<dyn SignalSource + Send>> {
    Err(HwError::Unsupported(
        "built without the `hardware` feature; load cell is simulated",
    ))
}

/// Which camera variant ended up in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    Cli(&'static str),
    Simulated,
}

/// Camera backend requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraBackend {
    #[default]
    Auto,
    Cli,
    Simulated,
}

/// Pick the camera once. `Auto` falls back to the simulated camera when no
/// CLI tool is found; `Cli` makes that a hard error.
pub fn select_camera(
    backend: CameraBackend,
    settings: CameraSettings,
) -> error::Result<(Box<dyn Camera + Send>, CameraKind)> {
    let sim = |s: &CameraSettings| -> (Box<dyn Camera + Send>, CameraKind) {
        (
            Box::new(SimulatedCamera::new(s.width, s.height)),
            CameraKind::Simulated,
        )
    };
    match backend {
        CameraBackend::Simulated => Ok(sim(&settings)),
        CameraBackend::Cli => {
            let cam = CliCamera::probe(settings)?;
            let tool = cam.tool();
            Ok((Box::new(cam), CameraKind::Cli(tool)))
        }
        CameraBackend::Auto => match CliCamera::probe(settings.clone()) {
            Ok(cam) => {
                let tool = cam.tool();
                Ok((Box::new(cam), CameraKind::Cli(tool)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "camera unavailable; using simulated camera");
                Ok(sim(&settings))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_source_is_constant() {
        let mut s = SimulatedSource::with_raw(-7);
        assert_eq!(s.read(Duration::from_millis(1)).unwrap(), -7);
        assert_eq!(s.read(Duration::from_millis(1)).unwrap(), -7);
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn hx711_unsupported_without_feature() {
        let pins = Hx711Pins {
            dt: 5,
            sck: 6,
            gain_pulses: 25,
        };
        let err = open_hx711(&pins, Duration::from_millis(1))
            .err()
            .expect("should be unsupported");
        assert!(err.is_unavailable());
    }

    #[test]
    fn forced_simulated_camera() {
        let (_cam, kind) =
            select_camera(CameraBackend::Simulated, CameraSettings::default()).unwrap();
        assert_eq!(kind, CameraKind::Simulated);
    }
}
