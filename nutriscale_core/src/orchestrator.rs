//! The scan state machine.
//!
//! One session walks `IDLE → WEIGHING → CAPTURING → RECOGNIZING → COMPUTING →
//! RESULT`, or ends early in `ERROR`. Capture and inference run on worker
//! threads bounded by their timeouts; every stage observes the session's
//! `CancelToken`. Only one session may be active per orchestrator; a second
//! `begin()` is rejected with `ScanRejected::Busy`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, UNIX_EPOCH};

use crossbeam_channel as xch;
use nutriscale_traits::clock::Clock;
use nutriscale_traits::{Camera, Classifier};

use crate::acquirer::{AcquiredWeight, WeightReader};
use crate::builder::{Missing, ScanOrchestratorBuilder};
use crate::cancel::CancelToken;
use crate::config::ScanCfg;
use crate::error::ScanRejected;
use crate::hw_error::capture_error_kind;
use crate::nutrition::NutritionResolver;
use crate::recognition::{accept, normalize_candidates};
use crate::runner::{StageOutcome, lock_unless_aborted, run_stage, sleep_unless_cancelled};
use crate::session::{ScanError, ScanErrorKind, ScanEvent, ScanSession, ScanState, Transition};

pub(crate) type SharedCamera = Arc<Mutex<Box<dyn Camera + Send>>>;
pub(crate) type SharedClassifier = Arc<Mutex<Box<dyn Classifier + Send>>>;

/// Pre-scan weight check for callers that want to prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightCheck {
    pub weight: AcquiredWeight,
    pub below_threshold: bool,
    /// Grams nutrition would be scaled for.
    pub scaled_grams: u32,
}

pub struct ScanOrchestrator {
    pub(crate) weight: Arc<dyn WeightReader>,
    pub(crate) camera: SharedCamera,
    pub(crate) classifier: SharedClassifier,
    pub(crate) nutrition: NutritionResolver,
    pub(crate) cfg: ScanCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) events: Option<xch::Sender<ScanEvent>>,
    pub(crate) active: AtomicBool,
    pub(crate) next_id: AtomicU64,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("cfg", &self.cfg)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    /// Start building an orchestrator.
    pub fn builder() -> ScanOrchestratorBuilder<Missing, Missing, Missing> {
        ScanOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &ScanCfg {
        &self.cfg
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Current weight with the threshold/floor rules applied.
    pub fn check_weight(&self) -> WeightCheck {
        let weight = self.weight.read_weight();
        WeightCheck {
            weight,
            below_threshold: weight.grams < self.cfg.min_weight_threshold_g,
            scaled_grams: weight.grams.max(self.cfg.min_weight_floor_g),
        }
    }

    /// Claim the session slot. Dropping the returned scan (run or not)
    /// releases it.
    pub fn begin(&self) -> Result<ActiveScan<'_>, ScanRejected> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("scan request rejected: session already active");
            return Err(ScanRejected::Busy);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at_ms = self
            .clock
            .wall()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Ok(ActiveScan {
            orch: self,
            session: ScanSession::new(id, started_at_ms),
            cancel: CancelToken::new(),
            epoch: self.clock.now(),
            _slot: SlotGuard(&self.active),
        })
    }

    /// Run one full scan on the calling thread.
    pub fn scan(&self) -> Result<ScanSession, ScanRejected> {
        Ok(self.begin()?.run())
    }

    fn stop_preview_if_idle(&self) {
        // A worker still holding the camera stops its own preview on abort.
        if let Ok(mut cam) = self.camera.try_lock() {
            cam.stop_preview();
        }
    }
}

struct SlotGuard<'a>(&'a AtomicBool);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A claimed, not yet finished scan.
pub struct ActiveScan<'a> {
    orch: &'a ScanOrchestrator,
    session: ScanSession,
    cancel: CancelToken,
    epoch: Instant,
    _slot: SlotGuard<'a>,
}

impl ActiveScan<'_> {
    pub fn id(&self) -> u64 {
        self.session.id
    }

    /// Handle that cancels this scan from any thread.
    pub fn canceller(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive the session to a terminal state. Never panics on stage failure;
    /// every failure ends in `ERROR` with a kind and message.
    pub fn run(mut self) -> ScanSession {
        let o = self.orch;
        let cfg = &o.cfg;
        tracing::info!(session = self.session.id, "scan started");

        // ── WEIGHING ─────────────────────────────────────────────────────────
        self.enter(ScanState::Weighing);
        if !sleep_unless_cancelled(Duration::from_millis(cfg.settle_ms), &self.cancel) {
            return self.fail(ScanErrorKind::Cancelled, "cancelled while weighing");
        }
        let w = o.weight.read_weight();
        self.session.measured_grams = w.grams;
        self.session.scaled_grams = w.grams.max(cfg.min_weight_floor_g);
        self.session.below_threshold = w.grams < cfg.min_weight_threshold_g;
        tracing::debug!(
            session = self.session.id,
            grams = w.grams,
            scaled = self.session.scaled_grams,
            below_threshold = self.session.below_threshold,
            mode = ?w.mode,
            "weight taken"
        );

        // ── CAPTURING ────────────────────────────────────────────────────────
        self.enter(ScanState::Capturing);
        let camera = o.camera.clone();
        let capture_timeout = Duration::from_millis(cfg.capture_timeout_ms);
        let captured = run_stage("capture", capture_timeout, &self.cancel, move |abort| {
            let Some(mut cam) = lock_unless_aborted(&*camera, abort) else {
                return Err((ScanErrorKind::Cancelled, "camera still busy".to_string()));
            };
            cam.capture(abort)
                .map_err(|e| (capture_error_kind(e.as_ref()), e.to_string()))
        });
        let frame = match captured {
            StageOutcome::Done(Ok(frame)) => frame,
            StageOutcome::Done(Err((kind, msg))) => {
                return self.fail(kind, format!("capture: {msg}"));
            }
            StageOutcome::Cancelled => {
                o.stop_preview_if_idle();
                return self.fail(ScanErrorKind::Cancelled, "cancelled during capture");
            }
            StageOutcome::TimedOut => {
                o.stop_preview_if_idle();
                return self.fail(
                    ScanErrorKind::Timeout,
                    format!("capture exceeded {} ms", cfg.capture_timeout_ms),
                );
            }
            StageOutcome::Died(msg) => return self.fail(ScanErrorKind::CaptureFailed, msg),
        };
        tracing::debug!(
            session = self.session.id,
            width = frame.width(),
            height = frame.height(),
            "frame captured"
        );
        self.session.image = Some(frame.clone());

        // ── RECOGNIZING ──────────────────────────────────────────────────────
        self.enter(ScanState::Recognizing);
        let classifier = o.classifier.clone();
        let top_k = cfg.top_k;
        let inference_timeout = Duration::from_millis(cfg.inference_timeout_ms);
        let classified = run_stage("inference", inference_timeout, &self.cancel, move |abort| {
            let Some(mut k) = lock_unless_aborted(&*classifier, abort) else {
                return Err("classifier still busy".to_string());
            };
            k.classify(&frame, top_k, abort).map_err(|e| e.to_string())
        });
        let candidates = match classified {
            StageOutcome::Done(Ok(c)) => normalize_candidates(c, top_k),
            StageOutcome::Done(Err(msg)) => {
                return self.fail(ScanErrorKind::InferenceFailed, format!("classifier: {msg}"));
            }
            StageOutcome::Cancelled => {
                return self.fail(ScanErrorKind::Cancelled, "cancelled during recognition");
            }
            StageOutcome::TimedOut => {
                return self.fail(
                    ScanErrorKind::Timeout,
                    format!("inference exceeded {} ms", cfg.inference_timeout_ms),
                );
            }
            StageOutcome::Died(msg) => return self.fail(ScanErrorKind::InferenceFailed, msg),
        };
        let recognition = accept(&candidates, cfg.confidence_threshold);
        self.session.candidates = candidates;
        let Some(recognition) = recognition else {
            tracing::info!(
                session = self.session.id,
                top = ?self.session.candidates.first().map(|c| (&c.label, c.confidence)),
                threshold = cfg.confidence_threshold,
                "food not recognized"
            );
            return self.finish();
        };
        let label = recognition.label.clone();
        tracing::debug!(
            session = self.session.id,
            label = %label,
            confidence = recognition.confidence,
            "food recognized"
        );
        self.session.recognition = Some(recognition);

        // ── COMPUTING ────────────────────────────────────────────────────────
        if self.cancel.is_cancelled() {
            return self.fail(ScanErrorKind::Cancelled, "cancelled before computing");
        }
        self.enter(ScanState::Computing);
        let grams = self.session.scaled_grams;
        let resolved = catch_unwind(AssertUnwindSafe(|| o.nutrition.resolve(&label, grams)));
        match resolved {
            Err(_) => self.fail(ScanErrorKind::ComputeFailed, "food table lookup panicked"),
            Ok(None) => {
                tracing::warn!(session = self.session.id, label = %label, "no nutrition entry for label");
                self.finish()
            }
            Ok(Some(n)) if !n.is_sane() => self.fail(
                ScanErrorKind::ComputeFailed,
                format!("nutrition for {label} is negative or not finite"),
            ),
            Ok(Some(n)) => {
                self.session.nutrition = Some(n);
                self.finish()
            }
        }
    }

    fn enter(&mut self, state: ScanState) {
        let at_ms = self.orch.clock.ms_since(self.epoch);
        self.session.state = state;
        self.session.transitions.push(Transition { state, at_ms });
        tracing::debug!(session = self.session.id, %state, at_ms, "scan state");
        if let Some(tx) = &self.orch.events {
            let ev = ScanEvent {
                session_id: self.session.id,
                state,
                status: self.session.status(),
            };
            if tx.try_send(ev).is_err() {
                tracing::trace!(session = self.session.id, "scan event dropped");
            }
        }
    }

    fn fail(mut self, kind: ScanErrorKind, message: impl Into<String>) -> ScanSession {
        let message = message.into();
        tracing::warn!(session = self.session.id, ?kind, %message, "scan failed");
        self.session.error = Some(ScanError { kind, message });
        self.enter(ScanState::Error);
        self.session
    }

    fn finish(mut self) -> ScanSession {
        self.enter(ScanState::Result);
        if let Some(status) = self.session.status() {
            tracing::info!(
                session = self.session.id,
                %status,
                grams = self.session.scaled_grams,
                "scan finished"
            );
        }
        self.session
    }
}
