#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core scale logic (hardware-agnostic).
//!
//! All device access goes through `nutriscale_traits::{SignalSource, Camera,
//! Classifier}`; nothing here knows whether it is talking to real hardware.
//!
//! ## Architecture
//!
//! - **Acquisition**: `WeightAcquirer` runs a sampler thread over the load cell
//!   and serves calibrated, median-filtered grams (`acquirer`, `sampler`)
//! - **Calibration**: offset/gain model and tare/calibrate (`calibration`)
//! - **Scan pipeline**: `ScanOrchestrator` state machine with bounded,
//!   cancellable stages (`orchestrator`, `runner`, `cancel`, `session`)
//! - **Recognition**: ranking and acceptance of classifier output (`recognition`)
//! - **Nutrition**: per-100 g lookup scaled by weight (`nutrition`)
//! - **BMI**: age-banded assessment for the result screen (`bmi`)

pub mod acquirer;
pub mod bmi;
pub mod builder;
pub mod calibration;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod nutrition;
pub mod orchestrator;
pub mod recognition;
pub mod runner;
pub mod sampler;
pub mod session;
pub mod util;

pub use acquirer::{AcquireMode, AcquiredWeight, WeightAcquirer, WeightHandle, WeightReader};
pub use builder::{Missing, ScanOrchestratorBuilder, Set};
pub use calibration::CalibrationState;
pub use cancel::CancelToken;
pub use config::{SamplingCfg, ScanCfg};
pub use error::{BuildError, Report, Result, ScaleError, ScanRejected};
pub use nutrition::{FoodFacts, FoodTable, Macros, NutritionResolver, NutritionResult};
pub use orchestrator::{ActiveScan, ScanOrchestrator, WeightCheck};
pub use recognition::{ModelClassifier, RecognitionResult};
pub use session::{ScanError, ScanErrorKind, ScanEvent, ScanSession, ScanState, ScanStatus, Transition};
