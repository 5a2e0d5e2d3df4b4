//! Type-state builder for `ScanOrchestrator`.
//!
//! The builder enforces at compile time that the weight reader, camera and
//! classifier are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex};

use crossbeam_channel as xch;
use nutriscale_traits::clock::{Clock, MonotonicClock};
use nutriscale_traits::{Camera, Classifier};

use crate::acquirer::WeightReader;
use crate::config::ScanCfg;
use crate::error::{BuildError, Result};
use crate::nutrition::{FoodTable, NutritionResolver};
use crate::orchestrator::ScanOrchestrator;
use crate::session::ScanEvent;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `ScanOrchestrator`. Configuration is validated on `build()`.
pub struct ScanOrchestratorBuilder<W, C, K> {
    weight: Option<Arc<dyn WeightReader>>,
    camera: Option<Box<dyn Camera + Send>>,
    classifier: Option<Box<dyn Classifier + Send>>,
    foods: Option<Arc<dyn FoodTable>>,
    cfg: Option<ScanCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    events: Option<xch::Sender<ScanEvent>>,
    _w: PhantomData<W>,
    _c: PhantomData<C>,
    _k: PhantomData<K>,
}

impl Default for ScanOrchestratorBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            weight: None,
            camera: None,
            classifier: None,
            foods: None,
            cfg: None,
            clock: None,
            events: None,
            _w: PhantomData,
            _c: PhantomData,
            _k: PhantomData,
        }
    }
}

fn validate(cfg: &ScanCfg) -> Result<()> {
    if !(cfg.confidence_threshold.is_finite() && (0.0..=1.0).contains(&cfg.confidence_threshold))
    {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "confidence_threshold must be in [0.0, 1.0]",
        )));
    }
    if cfg.top_k == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "top_k must be >= 1",
        )));
    }
    if cfg.capture_timeout_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "capture_timeout_ms must be >= 1",
        )));
    }
    if cfg.inference_timeout_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "inference_timeout_ms must be >= 1",
        )));
    }
    Ok(())
}

impl<W, C, K> ScanOrchestratorBuilder<W, C, K> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<ScanOrchestrator> {
        let weight = self
            .weight
            .ok_or_else(|| eyre::Report::new(BuildError::MissingWeight))?;
        let camera = self
            .camera
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCamera))?;
        let classifier = self
            .classifier
            .ok_or_else(|| eyre::Report::new(BuildError::MissingClassifier))?;
        let foods = self
            .foods
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFoods))?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(ScanOrchestrator {
            weight,
            camera: Arc::new(Mutex::new(camera)),
            classifier: Arc::new(Mutex::new(classifier)),
            nutrition: NutritionResolver::new(foods),
            cfg,
            clock,
            events: self.events,
            active: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
        })
    }

    fn retype<W2, C2, K2>(self) -> ScanOrchestratorBuilder<W2, C2, K2> {
        ScanOrchestratorBuilder {
            weight: self.weight,
            camera: self.camera,
            classifier: self.classifier,
            foods: self.foods,
            cfg: self.cfg,
            clock: self.clock,
            events: self.events,
            _w: PhantomData,
            _c: PhantomData,
            _k: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<W, C, K> ScanOrchestratorBuilder<W, C, K> {
    pub fn with_config(mut self, cfg: ScanCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }
    pub fn with_foods(mut self, foods: Arc<dyn FoodTable>) -> Self {
        self.foods = Some(foods);
        self
    }
    /// Publish a `ScanEvent` per transition. Sends never block; a full channel drops events.
    pub fn with_events(mut self, tx: xch::Sender<ScanEvent>) -> Self {
        self.events = Some(tx);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<C, K> ScanOrchestratorBuilder<Missing, C, K> {
    pub fn with_weight(
        mut self,
        weight: impl WeightReader + 'static,
    ) -> ScanOrchestratorBuilder<Set, C, K> {
        self.weight = Some(Arc::new(weight));
        self.retype()
    }
}

impl<W, K> ScanOrchestratorBuilder<W, Missing, K> {
    pub fn with_camera(
        mut self,
        camera: impl Camera + Send + 'static,
    ) -> ScanOrchestratorBuilder<W, Set, K> {
        self.camera = Some(Box::new(camera));
        self.retype()
    }
}

impl<W, C> ScanOrchestratorBuilder<W, C, Missing> {
    pub fn with_classifier(
        mut self,
        classifier: impl Classifier + Send + 'static,
    ) -> ScanOrchestratorBuilder<W, C, Set> {
        self.classifier = Some(Box::new(classifier));
        self.retype()
    }
}

impl ScanOrchestratorBuilder<Set, Set, Set> {
    /// Validate and build. Only available once weight, camera and classifier are set.
    pub fn build(self) -> Result<ScanOrchestrator> {
        self.try_build()
    }
}
