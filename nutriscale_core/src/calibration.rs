//! Linear raw-counts to grams model established by tare and calibrate.

use std::time::SystemTime;

use serde::Serialize;

use crate::error::ScaleError;

/// Offset/gain pair plus when it was last set.
///
/// `grams = (raw - offset) / gain`, clamped to `>= 0`. `gain` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationState {
    /// Raw counts at zero grams.
    pub offset: i32,
    /// Raw counts per gram.
    pub gain: f32,
    /// `None` until tare or calibrate runs in this process.
    pub calibrated_at: Option<SystemTime>,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            offset: 0,
            gain: 210.0,
            calibrated_at: None,
        }
    }
}

impl CalibrationState {
    pub fn new(offset: i32, gain: f32) -> Result<Self, ScaleError> {
        check_gain(gain)?;
        Ok(Self {
            offset,
            gain,
            calibrated_at: None,
        })
    }

    /// Convert one raw reading to whole grams.
    #[inline]
    pub fn grams(&self, raw: i32) -> u32 {
        let g = (f64::from(raw) - f64::from(self.offset)) / f64::from(self.gain);
        if !g.is_finite() || g <= 0.0 {
            return 0;
        }
        let r = g.round();
        if r >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            r as u32
        }
    }
}

pub(crate) fn check_gain(gain: f32) -> Result<(), ScaleError> {
    if gain.is_finite() && gain != 0.0 {
        Ok(())
    } else {
        Err(ScaleError::DegenerateGain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1.0, 0, 0)]
    #[case(1000, 10.0, 2000, 100)]
    #[case(1000, 10.0, 1004, 0)]
    #[case(1000, 10.0, 1005, 1)]
    #[case(1000, 10.0, 900, 0)]
    #[case(-500, 2.0, 500, 500)]
    #[case(0, -2.0, -400, 200)]
    fn grams_follows_offset_and_gain(
        #[case] offset: i32,
        #[case] gain: f32,
        #[case] raw: i32,
        #[case] want: u32,
    ) {
        let c = CalibrationState::new(offset, gain).unwrap();
        assert_eq!(c.grams(raw), want);
    }

    #[test]
    fn extreme_counts_do_not_wrap() {
        let c = CalibrationState::new(i32::MIN, 0.001).unwrap();
        assert_eq!(c.grams(i32::MAX), u32::MAX);
    }

    #[test]
    fn zero_or_nan_gain_is_rejected() {
        assert_eq!(CalibrationState::new(0, 0.0), Err(ScaleError::DegenerateGain));
        assert!(CalibrationState::new(0, f32::NAN).is_err());
        assert!(CalibrationState::new(0, f32::INFINITY).is_err());
    }
}
