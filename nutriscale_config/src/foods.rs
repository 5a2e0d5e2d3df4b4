//! Food nutrition table: per-100 g macro values keyed by classifier label.
//!
//! File format (JSON object keyed by label):
//!
//! ```json
//! { "rice": { "name": "Rice", "calorie": 120, "protein": 2.5, "carb": 26, "fat": 0.3 } }
//! ```
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Per-100 g values for one food.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FoodEntry {
    /// Display name shown to the user.
    pub name: String,
    pub calorie: f64,
    pub protein: f64,
    pub carb: f64,
    pub fat: f64,
}

/// Label-keyed food table loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct FoodDatabase {
    entries: BTreeMap<String, FoodEntry>,
}

impl FoodDatabase {
    pub fn from_json_str(s: &str) -> eyre::Result<Self> {
        let entries: BTreeMap<String, FoodEntry> =
            serde_json::from_str(s).map_err(|e| eyre::eyre!("parse food table: {e}"))?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("read food table {}: {e}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, FoodEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&FoodEntry> {
        self.entries.get(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring match over label and display name.
    pub fn search(&self, query: &str) -> Vec<(&str, &FoodEntry)> {
        let q = query.to_lowercase();
        self.entries
            .iter()
            .filter(|(k, v)| k.to_lowercase().contains(&q) || v.name.to_lowercase().contains(&q))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    /// All entries, sorted by label.
    pub fn all(&self) -> impl Iterator<Item = (&str, &FoodEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
