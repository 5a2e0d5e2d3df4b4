//! `From` implementations bridging `nutriscale_config` types to core types.

use crate::calibration::CalibrationState;
use crate::config::{SamplingCfg, ScanCfg};

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&nutriscale_config::Sampling> for SamplingCfg {
    fn from(c: &nutriscale_config::Sampling) -> Self {
        let max_g = (f64::from(c.max_weight_kg) * 1000.0).round();
        Self {
            sample_rate_hz: c.sample_rate_hz,
            read_timeout_ms: c.read_timeout_ms,
            window: c.window,
            burst_samples: c.burst_samples,
            burst_timeout_ms: c.burst_timeout_ms,
            max_weight_g: if max_g >= f64::from(u32::MAX) {
                u32::MAX
            } else {
                max_g.max(0.0) as u32
            },
        }
    }
}

// ── ScanCfg ──────────────────────────────────────────────────────────────────

impl From<&nutriscale_config::Scan> for ScanCfg {
    fn from(c: &nutriscale_config::Scan) -> Self {
        Self {
            confidence_threshold: c.confidence_threshold,
            min_weight_threshold_g: c.min_weight_threshold_g,
            min_weight_floor_g: c.min_weight_floor_g,
            top_k: c.top_k,
            settle_ms: c.settle_ms,
            capture_timeout_ms: c.capture_timeout_ms,
            inference_timeout_ms: c.inference_timeout_ms,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&nutriscale_config::PersistedCalibration> for CalibrationState {
    fn from(c: &nutriscale_config::PersistedCalibration) -> Self {
        Self {
            offset: c.offset,
            gain: c.gain,
            calibrated_at: None,
        }
    }
}

impl From<&CalibrationState> for nutriscale_config::PersistedCalibration {
    fn from(c: &CalibrationState) -> Self {
        Self {
            offset: c.offset,
            gain: c.gain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_weight_kg_becomes_grams() {
        let s = nutriscale_config::Sampling {
            max_weight_kg: 5.0,
            ..Default::default()
        };
        assert_eq!(SamplingCfg::from(&s).max_weight_g, 5000);
    }

    #[test]
    fn calibration_survives_persistence() {
        let c = CalibrationState::new(-1234, 98.5).unwrap();
        let p = nutriscale_config::PersistedCalibration::from(&c);
        let back = CalibrationState::from(&p);
        assert_eq!(back.offset, -1234);
        assert_eq!(back.gain, 98.5);
    }
}
