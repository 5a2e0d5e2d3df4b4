//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nutriscale", version, about = "Food scale with camera recognition")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/nutriscale.toml")]
    pub config: PathBuf,

    /// Calibration TOML written by `calibrate --save`; overrides [calibration]
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print results and errors as JSON objects, one per line
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the current weight
    Weigh {
        /// Number of readings to print
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Delay between readings
        #[arg(long, value_name = "MS", default_value_t = 500)]
        interval_ms: u64,
    },
    /// Zero the scale with nothing on the platter
    Tare {
        /// Write the new calibration to this file
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Tare, then derive the gain from a known reference weight
    Calibrate {
        /// Reference weight in grams placed on the scale after taring
        #[arg(long)]
        grams: f32,
        /// Time to place the reference weight after taring
        #[arg(long, value_name = "MS", default_value_t = 5000)]
        place_ms: u64,
        /// Write the new calibration to this file
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Weigh, photograph and recognize the plate, then compute nutrition
    Scan {
        /// Body height for a BMI assessment
        #[arg(long, value_name = "CM", requires_all = ["body_kg", "age"])]
        height_cm: Option<f64>,
        /// Body weight for a BMI assessment
        #[arg(long, value_name = "KG", requires = "height_cm")]
        body_kg: Option<f64>,
        /// Age in years for the BMI category bands
        #[arg(long, value_name = "YEARS", requires = "height_cm")]
        age: Option<u32>,
    },
    /// List the food table, optionally filtered
    Foods {
        /// Case-insensitive match on label or name
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
    },
    /// Report which device variants were selected
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
