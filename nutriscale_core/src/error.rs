use thiserror::Error;

/// Failures of the weight-acquisition path.
///
/// Per-sample read errors never reach callers as `ScaleError`; they are
/// logged by the sampler thread and the previous weight is kept.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("transient sensor I/O error: {0}")]
    TransientIo(String),
    #[error("reference weight must be a positive number of grams, got {0}")]
    InvalidReference(f32),
    #[error("reference reading equals the tare offset; nothing on the scale?")]
    DegenerateGain,
    #[error("collected {got} of {wanted} samples before the burst timed out")]
    BurstTimeout { got: usize, wanted: usize },
    #[error("sampling is stopped")]
    Stopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing weight reader")]
    MissingWeight,
    #[error("missing camera")]
    MissingCamera,
    #[error("missing classifier")]
    MissingClassifier,
    #[error("missing food table")]
    MissingFoods,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// A scan request that never started a session.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScanRejected {
    #[error("a scan is already in progress")]
    Busy,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
