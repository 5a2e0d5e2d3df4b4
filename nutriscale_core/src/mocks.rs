//! Test doubles for the core's seams.
//!
//! Public so integration tests, benches and the CLI's tests can drive the
//! acquirer and the orchestrator without hardware.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use nutriscale_traits::{AbortSignal, BoxError, Camera, Candidate, Classifier, Frame, SignalSource};

use crate::acquirer::{AcquireMode, AcquiredWeight, WeightReader};
use crate::nutrition::{FoodFacts, FoodTable, Macros};

/// Load cell whose raw value is set from the test through a shared "platter".
#[derive(Debug, Clone, Default)]
pub struct PlatterSource {
    raw: Arc<AtomicI32>,
    failing: Arc<AtomicBool>,
    shutdowns: Arc<AtomicUsize>,
}

impl PlatterSource {
    pub fn new(raw: i32) -> Self {
        let s = Self::default();
        s.set_raw(raw);
        s
    }

    pub fn set_raw(&self, raw: i32) {
        self.raw.store(raw, Ordering::SeqCst);
    }

    /// Make every read fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl SignalSource for PlatterSource {
    fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        // Pace like a real converter so a test loop does not spin.
        std::thread::sleep(Duration::from_millis(1));
        if self.failing.load(Ordering::SeqCst) {
            return Err(Box::new(std::io::Error::other("injected read fault")));
        }
        Ok(self.raw.load(Ordering::SeqCst))
    }

    fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// A source that always errors on read.
pub struct NoopSource;

impl SignalSource for NoopSource {
    fn read(&mut self, timeout: Duration) -> Result<i32, BoxError> {
        std::thread::sleep(timeout.min(Duration::from_millis(5)));
        Err(Box::new(std::io::Error::other("noop source")))
    }
}

/// Weight reader returning a value set by the test.
#[derive(Debug, Clone)]
pub struct FixedWeight {
    grams: Arc<AtomicU32>,
    mode: AcquireMode,
}

impl FixedWeight {
    pub fn new(grams: u32) -> Self {
        Self {
            grams: Arc::new(AtomicU32::new(grams)),
            mode: AcquireMode::Hardware,
        }
    }

    pub fn set(&self, grams: u32) {
        self.grams.store(grams, Ordering::SeqCst);
    }
}

impl WeightReader for FixedWeight {
    fn read_weight(&self) -> AcquiredWeight {
        AcquiredWeight {
            grams: self.grams.load(Ordering::SeqCst),
            mode: self.mode,
            overloaded: false,
        }
    }
}

/// How a `MockCamera` answers `capture`.
#[derive(Debug, Clone)]
pub enum CaptureBehavior {
    /// Return a solid-color frame of this size.
    Frame(u32, u32),
    Fail(String),
    /// Block until the abort signal is raised, then fail.
    HangUntilAborted,
}

/// Camera double that records preview and abort activity.
#[derive(Debug, Clone)]
pub struct MockCamera {
    behavior: CaptureBehavior,
    captures: Arc<AtomicUsize>,
    aborted: Arc<AtomicBool>,
    preview_stops: Arc<AtomicUsize>,
}

impl MockCamera {
    pub fn new(behavior: CaptureBehavior) -> Self {
        Self {
            behavior,
            captures: Arc::default(),
            aborted: Arc::default(),
            preview_stops: Arc::default(),
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Whether a capture observed its abort signal.
    pub fn saw_abort(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn preview_stops(&self) -> usize {
        self.preview_stops.load(Ordering::SeqCst)
    }
}

impl Camera for MockCamera {
    fn capture(&mut self, abort: &AbortSignal) -> Result<Frame, BoxError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            CaptureBehavior::Frame(w, h) => {
                let len = (*w as usize) * (*h as usize) * 3;
                Frame::from_rgb(*w, *h, vec![128; len])
                    .ok_or_else(|| BoxError::from("bad mock frame size"))
            }
            CaptureBehavior::Fail(msg) => Err(BoxError::from(msg.clone())),
            CaptureBehavior::HangUntilAborted => {
                while !abort.is_raised() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                self.aborted.store(true, Ordering::SeqCst);
                Err(BoxError::from("capture aborted"))
            }
        }
    }

    fn stop_preview(&mut self) {
        self.preview_stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Classifier double returning a fixed answer.
#[derive(Debug, Clone)]
pub enum MockClassifier {
    Candidates(Vec<Candidate>),
    Fail(String),
    /// Work for this long, then return no candidates. Gives up early when
    /// the abort signal is raised.
    Slow(Duration),
}

impl Classifier for MockClassifier {
    fn classify(
        &mut self,
        _frame: &Frame,
        top_k: usize,
        abort: &AbortSignal,
    ) -> Result<Vec<Candidate>, BoxError> {
        match self {
            MockClassifier::Candidates(c) => Ok(c.iter().take(top_k).cloned().collect()),
            MockClassifier::Fail(msg) => Err(BoxError::from(msg.clone())),
            MockClassifier::Slow(d) => {
                let deadline = Instant::now() + *d;
                while Instant::now() < deadline {
                    if abort.is_raised() {
                        return Err(BoxError::from("inference aborted"));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok(Vec::new())
            }
        }
    }
}

/// In-memory food table.
#[derive(Debug, Clone, Default)]
pub struct StaticFoods(HashMap<String, FoodFacts>);

impl StaticFoods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: &str, calories: f64, protein_g: f64, carb_g: f64, fat_g: f64) -> Self {
        self.0.insert(
            label.to_string(),
            FoodFacts {
                name: label.to_string(),
                per_100g: Macros {
                    calories,
                    protein_g,
                    carb_g,
                    fat_g,
                },
            },
        );
        self
    }
}

impl FoodTable for StaticFoods {
    fn lookup(&self, label: &str) -> Option<FoodFacts> {
        self.0.get(label).cloned()
    }
}
