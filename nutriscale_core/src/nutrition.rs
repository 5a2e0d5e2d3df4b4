//! Per-100 g nutrition lookup scaled to a measured weight.

use std::sync::Arc;

use nutriscale_config::FoodDatabase;
use serde::Serialize;

use crate::util::round1;

/// Energy and macro amounts. Units: kcal and grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Macros {
    pub calories: f64,
    pub protein_g: f64,
    pub carb_g: f64,
    pub fat_g: f64,
}

impl Macros {
    /// Scale each field by `grams / 100` and round to one decimal,
    /// independently.
    pub fn scaled(&self, grams: u32) -> Self {
        let g = f64::from(grams);
        let s = |base: f64| round1(base * g / 100.0);
        Self {
            calories: s(self.calories),
            protein_g: s(self.protein_g),
            carb_g: s(self.carb_g),
            fat_g: s(self.fat_g),
        }
    }

    fn is_sane(&self) -> bool {
        [self.calories, self.protein_g, self.carb_g, self.fat_g]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Table entry: display name plus values per 100 g.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodFacts {
    pub name: String,
    pub per_100g: Macros,
}

/// Label-keyed food data.
pub trait FoodTable: Send + Sync {
    fn lookup(&self, label: &str) -> Option<FoodFacts>;
}

impl FoodTable for FoodDatabase {
    fn lookup(&self, label: &str) -> Option<FoodFacts> {
        self.get(label).map(|e| FoodFacts {
            name: e.name.clone(),
            per_100g: Macros {
                calories: e.calorie,
                protein_g: e.protein,
                carb_g: e.carb,
                fat_g: e.fat,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionResult {
    pub label: String,
    pub name: String,
    pub weight_grams: u32,
    #[serde(flatten)]
    pub macros: Macros,
}

impl NutritionResult {
    /// All values finite and non-negative.
    pub fn is_sane(&self) -> bool {
        self.macros.is_sane()
    }
}

/// Stateless resolver over a shared food table.
#[derive(Clone)]
pub struct NutritionResolver {
    table: Arc<dyn FoodTable>,
}

impl std::fmt::Debug for NutritionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NutritionResolver").finish_non_exhaustive()
    }
}

impl NutritionResolver {
    pub fn new(table: Arc<dyn FoodTable>) -> Self {
        Self { table }
    }

    /// `None` when `label` is not in the table.
    pub fn resolve(&self, label: &str, weight_grams: u32) -> Option<NutritionResult> {
        let facts = self.table.lookup(label)?;
        Some(NutritionResult {
            label: label.to_string(),
            name: facts.name,
            weight_grams,
            macros: facts.per_100g.scaled(weight_grams),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutriscale_config::FoodEntry;
    use rstest::rstest;

    fn rice_db() -> FoodDatabase {
        FoodDatabase::from_entries([(
            "rice".to_string(),
            FoodEntry {
                name: "Rice".into(),
                calorie: 120.0,
                protein: 2.5,
                carb: 26.0,
                fat: 0.3,
            },
        )])
    }

    #[test]
    fn rice_at_180_grams() {
        let r = NutritionResolver::new(Arc::new(rice_db()));
        let n = r.resolve("rice", 180).unwrap();
        assert_eq!(n.name, "Rice");
        assert_eq!(n.weight_grams, 180);
        assert!((n.macros.calories - 216.0).abs() < 1e-9);
        assert!((n.macros.protein_g - 4.5).abs() < 1e-9);
        assert!((n.macros.carb_g - 46.8).abs() < 1e-9);
        assert!((n.macros.fat_g - 0.5).abs() < 1e-9);
    }

    #[rstest]
    #[case(0.1, 250, 0.2)]
    #[case(0.2, 125, 0.2)]
    #[case(0.3, 250, 0.8)]
    #[case(1.0, 5, 0.1)]
    fn half_tenths_round_to_even(#[case] base: f64, #[case] grams: u32, #[case] want: f64) {
        let m = Macros {
            calories: base,
            protein_g: base,
            carb_g: base,
            fat_g: base,
        }
        .scaled(grams);
        assert_eq!(m.calories, want);
        assert_eq!(m.protein_g, want);
    }

    #[test]
    fn unknown_label_is_none() {
        let r = NutritionResolver::new(Arc::new(rice_db()));
        assert!(r.resolve("pizza", 100).is_none());
    }

    #[test]
    fn zero_grams_scale_to_zero() {
        let m = Macros {
            calories: 120.0,
            protein_g: 2.5,
            carb_g: 26.0,
            fat_g: 0.3,
        }
        .scaled(0);
        assert_eq!(m.calories, 0.0);
        assert_eq!(m.fat_g, 0.0);
    }

    #[test]
    fn negative_base_is_not_sane() {
        let n = NutritionResult {
            label: "x".into(),
            name: "X".into(),
            weight_grams: 100,
            macros: Macros {
                calories: -1.0,
                protein_g: 0.0,
                carb_g: 0.0,
                fat_g: 0.0,
            },
        };
        assert!(!n.is_sane());
    }
}
