//! Maps `Box<dyn Error>` from trait boundaries to typed errors.
//!
//! The traits in `nutriscale_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to `ScaleError` for the load cell and to a
//! `ScanErrorKind` for camera and classifier stages. With the
//! `hardware-errors` feature, `nutriscale_hardware::HwError` is downcast for a
//! precise mapping; anything else goes through string heuristics.

use crate::error::ScaleError;
use crate::session::ScanErrorKind;

/// Map a load-cell error to a typed `ScaleError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        use nutriscale_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => ScaleError::Timeout,
                other if other.is_unavailable() => {
                    ScaleError::HardwareUnavailable(other.to_string())
                }
                other => ScaleError::TransientIo(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ScaleError::Timeout
    } else {
        ScaleError::TransientIo(s)
    }
}

/// Classify a camera failure. Everything except a device timeout is a
/// capture failure.
pub fn capture_error_kind(e: &(dyn std::error::Error + 'static)) -> ScanErrorKind {
    #[cfg(feature = "hardware-errors")]
    {
        use nutriscale_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => ScanErrorKind::Timeout,
                HwError::Aborted => ScanErrorKind::Cancelled,
                _ => ScanErrorKind::CaptureFailed,
            };
        }
    }

    if e.to_string().to_lowercase().contains("timeout") {
        ScanErrorKind::Timeout
    } else {
        ScanErrorKind::CaptureFailed
    }
}
