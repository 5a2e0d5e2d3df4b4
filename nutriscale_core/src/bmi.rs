//! Body-mass index with age-banded categories.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::util::round2;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BmiError {
    #[error("body weight must be a positive number of kg, got {0}")]
    InvalidWeight(f64),
    #[error("height must be a positive number of cm, got {0}")]
    InvalidHeight(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
    /// Above the normal band for children and seniors.
    High,
}

impl BmiCategory {
    /// Categories that should raise a warning to the user.
    pub fn warns(self) -> bool {
        matches!(
            self,
            BmiCategory::Overweight | BmiCategory::Obese | BmiCategory::High
        )
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
            BmiCategory::High => "High",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BmiAssessment {
    /// kg/m², two decimals.
    pub bmi: f64,
    pub category: BmiCategory,
    pub warning: bool,
}

/// `weight_kg / (height_cm / 100)²`, rounded to two decimals.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Result<f64, BmiError> {
    if !(weight_kg.is_finite() && weight_kg > 0.0) {
        return Err(BmiError::InvalidWeight(weight_kg));
    }
    if !(height_cm.is_finite() && height_cm > 0.0) {
        return Err(BmiError::InvalidHeight(height_cm));
    }
    let m = height_cm / 100.0;
    Ok(round2(weight_kg / (m * m)))
}

pub fn category(bmi: f64, age: u32) -> BmiCategory {
    use BmiCategory::{High, Normal, Obese, Overweight, Underweight};
    match age {
        0..=17 => {
            if bmi < 14.0 {
                Underweight
            } else if bmi < 18.0 {
                Normal
            } else {
                High
            }
        }
        18..=64 => {
            if bmi < 18.5 {
                Underweight
            } else if bmi < 25.0 {
                Normal
            } else if bmi < 30.0 {
                Overweight
            } else {
                Obese
            }
        }
        _ => {
            if bmi < 22.0 {
                Underweight
            } else if bmi < 27.0 {
                Normal
            } else {
                High
            }
        }
    }
}

pub fn assess(weight_kg: f64, height_cm: f64, age: u32) -> Result<BmiAssessment, BmiError> {
    let bmi = bmi(weight_kg, height_cm)?;
    let category = category(bmi, age);
    Ok(BmiAssessment {
        bmi,
        category,
        warning: category.warns(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn adult_reference_value() {
        let a = assess(70.0, 175.0, 30).unwrap();
        assert!((a.bmi - 22.86).abs() < 1e-9);
        assert_eq!(a.category, BmiCategory::Normal);
        assert!(!a.warning);
    }

    #[rstest]
    #[case(22.125, 100.0, 22.12)]
    #[case(20.375, 100.0, 20.38)]
    #[case(70.0, 175.0, 22.86)]
    fn bmi_rounds_half_to_even(#[case] kg: f64, #[case] cm: f64, #[case] want: f64) {
        assert_eq!(bmi(kg, cm).unwrap(), want);
    }

    #[rstest]
    #[case(13.9, 10, BmiCategory::Underweight)]
    #[case(17.9, 17, BmiCategory::Normal)]
    #[case(18.0, 17, BmiCategory::High)]
    #[case(18.4, 18, BmiCategory::Underweight)]
    #[case(24.99, 40, BmiCategory::Normal)]
    #[case(25.0, 40, BmiCategory::Overweight)]
    #[case(30.0, 64, BmiCategory::Obese)]
    #[case(21.9, 65, BmiCategory::Underweight)]
    #[case(26.9, 80, BmiCategory::Normal)]
    #[case(27.0, 80, BmiCategory::High)]
    fn bands_by_age(#[case] bmi: f64, #[case] age: u32, #[case] want: BmiCategory) {
        assert_eq!(category(bmi, age), want);
    }

    #[test]
    fn warning_categories() {
        assert!(BmiCategory::Overweight.warns());
        assert!(BmiCategory::Obese.warns());
        assert!(BmiCategory::High.warns());
        assert!(!BmiCategory::Underweight.warns());
        assert!(!BmiCategory::Normal.warns());
    }

    #[test]
    fn rejects_non_positive_inputs() {
        assert_eq!(bmi(0.0, 170.0), Err(BmiError::InvalidWeight(0.0)));
        assert_eq!(bmi(70.0, -1.0), Err(BmiError::InvalidHeight(-1.0)));
        assert!(bmi(f64::NAN, 170.0).is_err());
    }
}
