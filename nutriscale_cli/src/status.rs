//! `foods`, `self-check` and `health`.

use std::time::Duration;

use nutriscale_config::{Config, FoodEntry};
use serde::Serialize;
use serde_json::json;

use crate::app::{
    camera_label, load_foods, mode_name, open_camera, open_classifier, start_acquirer,
    wait_for_sample,
};

#[derive(Serialize)]
struct FoodRow<'a> {
    label: &'a str,
    name: &'a str,
    calorie: f64,
    protein: f64,
    carb: f64,
    fat: f64,
}

impl<'a> FoodRow<'a> {
    fn new(label: &'a str, e: &'a FoodEntry) -> Self {
        Self {
            label,
            name: &e.name,
            calorie: e.calorie,
            protein: e.protein,
            carb: e.carb,
            fat: e.fat,
        }
    }
}

pub fn foods(cfg: &Config, search: Option<&str>, json: bool) -> eyre::Result<()> {
    let db = load_foods(cfg)?;
    let rows: Vec<FoodRow<'_>> = match search {
        Some(q) => db.search(q).into_iter().map(|(k, e)| FoodRow::new(k, e)).collect(),
        None => db.all().map(|(k, e)| FoodRow::new(k, e)).collect(),
    };
    if json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No matching foods.");
        return Ok(());
    }
    println!(
        "{:<20} {:<24} {:>8} {:>8} {:>8} {:>8}",
        "label", "name", "kcal", "protein", "carb", "fat"
    );
    for r in &rows {
        println!(
            "{:<20} {:<24} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
            r.label, r.name, r.calorie, r.protein, r.carb, r.fat
        );
    }
    println!("(values per 100 g)");
    Ok(())
}

/// Open every device once and report which variant was chosen.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut acq = start_acquirer(cfg);
    let sampled = wait_for_sample(&acq, Duration::from_millis(1000));
    let scale = mode_name(acq.mode());
    acq.stop();

    let (_camera, kind) = open_camera(cfg)?;
    let classifier = open_classifier(cfg)?;
    let foods = load_foods(cfg)?;

    let missing: Vec<&str> = classifier
        .labels()
        .iter()
        .filter(|l| foods.get(l).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(labels = ?missing, "labels without a food table entry");
    }

    if json {
        println!(
            "{}",
            json!({
                "scale": scale,
                "scale_sampling": sampled,
                "camera": camera_label(kind),
                "classifier": "simulated",
                "labels": classifier.labels().len(),
                "foods": foods.len(),
                "labels_without_food": missing,
            })
        );
    } else {
        println!("scale:      {scale} ({})", if sampled { "sampling" } else { "no samples" });
        println!("camera:     {}", camera_label(kind));
        println!("classifier: simulated, {} labels", classifier.labels().len());
        println!("foods:      {} entries", foods.len());
        if !missing.is_empty() {
            println!("missing food entries: {}", missing.join(", "));
        }
        println!("OK");
    }
    Ok(())
}

/// Config is valid, the food table loads and the sampler is producing
/// readings. Fails otherwise.
pub fn health(cfg: &Config, json: bool) -> eyre::Result<()> {
    let foods = load_foods(cfg)?;
    let mut acq = start_acquirer(cfg);
    let sampled = wait_for_sample(&acq, Duration::from_millis(1000));
    let stalled_ms = acq.stalled_for_ms();
    let mode = mode_name(acq.mode());
    acq.stop();
    if !sampled {
        eyre::bail!("health: sampler produced no readings (scale timeout)");
    }
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "scale": mode,
                "stalled_ms": stalled_ms,
                "foods": foods.len(),
            })
        );
    } else {
        println!("healthy (scale: {mode}, last sample {stalled_ms} ms ago, {} foods)", foods.len());
    }
    Ok(())
}
