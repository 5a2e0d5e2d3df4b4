use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("scale timeout")]
    Timeout,
    #[error("hx711 data-ready timeout")]
    DataReadyTimeout,
    #[error("hx711 not ready: no data-ready within {0} ms")]
    NotReady(u64),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("camera capture failed: {0}")]
    Capture(String),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("aborted")]
    Aborted,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl HwError {
    /// Whether the device is absent or unusable, as opposed to a single bad read.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            HwError::Gpio(_) | HwError::NotReady(_) | HwError::Unsupported(_) | HwError::CameraUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
