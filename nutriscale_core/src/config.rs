//! Runtime configuration for the acquirer and the scan pipeline.
//!
//! These are separate from the TOML structs in `nutriscale_config`; see
//! `conversions` for the mapping.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SamplingCfg {
    pub sample_rate_hz: u32,
    /// Max wait for one conversion.
    pub read_timeout_ms: u64,
    /// Rolling median length (1 = latest sample only).
    pub window: usize,
    /// Samples averaged by tare and calibrate.
    pub burst_samples: usize,
    pub burst_timeout_ms: u64,
    /// Readings above this many grams are flagged as overloaded.
    pub max_weight_g: u32,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 20,
            read_timeout_ms: 150,
            window: 5,
            burst_samples: 10,
            burst_timeout_ms: 3000,
            max_weight_g: 5000,
        }
    }
}

impl SamplingCfg {
    pub(crate) fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub(crate) fn burst_timeout(&self) -> Duration {
        Duration::from_millis(self.burst_timeout_ms.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct ScanCfg {
    /// Minimum top-1 confidence for a label to be accepted.
    pub confidence_threshold: f32,
    /// Weights below this are flagged `below_threshold` for the caller.
    pub min_weight_threshold_g: u32,
    /// Nutrition is scaled for at least this many grams.
    pub min_weight_floor_g: u32,
    pub top_k: usize,
    /// Delay before the weight is read.
    pub settle_ms: u64,
    pub capture_timeout_ms: u64,
    pub inference_timeout_ms: u64,
}

impl Default for ScanCfg {
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
