//! Small numeric and timing helpers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the period in microseconds for a given sampling rate in Hz.
/// Clamps `hz` to at least 1 and the result to at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Median of `values`, reordering `scratch` in place. `None` when empty.
/// Even-length windows take the mean of the two middle values, rounded half away from zero.
pub fn median_i32(values: impl IntoIterator<Item = i32>, scratch: &mut Vec<i32>) -> Option<i32> {
    scratch.clear();
    scratch.extend(values);
    let n = scratch.len();
    if n == 0 {
        return None;
    }
    scratch.sort_unstable();
    if n % 2 == 1 {
        Some(scratch[n / 2])
    } else {
        let s = i64::from(scratch[n / 2 - 1]) + i64::from(scratch[n / 2]);
        let avg = if s >= 0 { (s + 1) / 2 } else { (s - 1) / 2 };
        // Mean of two i32 always fits in i32.
        Some(avg as i32)
    }
}

/// Arithmetic mean of raw samples rounded to nearest. `None` when empty.
pub fn mean_i32(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    let avg = (sum as f64 / values.len() as f64).round();
    Some(avg.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32)
}

/// Round the exact decimal value of `x` to `dp` places, ties to even.
/// Values a `Decimal` cannot hold (non-finite, huge) come back unchanged.
fn round_dp(x: f64, dp: u32) -> f64 {
    // Parsing the decimal text gives the f64 nearest the rounded value.
    Decimal::from_f64_retain(x)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_string().parse().ok())
        .unwrap_or(x)
}

/// Round to one decimal place.
#[inline]
pub fn round1(x: f64) -> f64 {
    round_dp(x, 1)
}

/// Round to two decimal places.
#[inline]
pub fn round2(x: f64) -> f64 {
    round_dp(x, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn period_clamps_zero_hz() {
        assert_eq!(period_us(0), MICROS_PER_SEC);
        assert_eq!(period_us(20), 50_000);
        assert_eq!(period_us(u32::MAX), 1);
    }

    #[test]
    fn median_odd_even_and_empty() {
        let mut s = Vec::new();
        assert_eq!(median_i32([5, 1, 3], &mut s), Some(3));
        assert_eq!(median_i32([1, 2, 3, 4], &mut s), Some(3));
        assert_eq!(median_i32([-1, -2], &mut s), Some(-2));
        assert_eq!(median_i32([i32::MAX, i32::MAX], &mut s), Some(i32::MAX));
        assert_eq!(median_i32(std::iter::empty(), &mut s), None);
    }

    #[test]
    fn median_rejects_single_spike() {
        let mut s = Vec::new();
        assert_eq!(median_i32([100, 101, 90_000, 99, 100], &mut s), Some(100));
    }

    #[test]
    fn mean_rounds_to_nearest() {
        assert_eq!(mean_i32(&[1, 2]), Some(2));
        assert_eq!(mean_i32(&[10, 10, 11]), Some(10));
        assert_eq!(mean_i32(&[]), None);
        assert_eq!(mean_i32(&[i32::MAX, i32::MAX]), Some(i32::MAX));
    }

    #[test]
    fn rounding_helpers() {
        assert!((round1(46.79999) - 46.8).abs() < 1e-12);
        assert!((round1(0.54) - 0.5).abs() < 1e-12);
        assert!((round2(22.857_142) - 22.86).abs() < 1e-12);
    }

    #[rstest]
    // Exact ties go to the even digit.
    #[case(0.25, 0.2)]
    #[case(0.75, 0.8)]
    #[case(1.25, 1.2)]
    // Stored just below the tie.
    #[case(10.45, 10.4)]
    // Stored just above the tie.
    #[case(0.05, 0.1)]
    #[case(0.45, 0.5)]
    #[case(0.0, 0.0)]
    fn round1_ties_to_even_on_the_stored_value(#[case] x: f64, #[case] want: f64) {
        assert_eq!(round1(x), want);
    }

    #[test]
    fn round2_ties_to_even() {
        assert_eq!(round2(22.125), 22.12);
        assert_eq!(round2(20.375), 20.38);
    }

    #[test]
    fn non_finite_passes_through() {
        assert!(round1(f64::NAN).is_nan());
        assert_eq!(round1(f64::INFINITY), f64::INFINITY);
    }
}
