//! Scan session record and the state/status vocabulary it reports.

use std::fmt;

use nutriscale_traits::{Candidate, Frame};
use serde::Serialize;
use thiserror::Error;

use crate::nutrition::NutritionResult;
use crate::recognition::RecognitionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
    Idle,
    Weighing,
    Capturing,
    Recognizing,
    Computing,
    Result,
    Error,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Result | ScanState::Error)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanState::Idle => "IDLE",
            ScanState::Weighing => "WEIGHING",
            ScanState::Capturing => "CAPTURING",
            ScanState::Recognizing => "RECOGNIZING",
            ScanState::Computing => "COMPUTING",
            ScanState::Result => "RESULT",
            ScanState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Why a session ended in `ERROR`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanErrorKind {
    #[error("capture failed")]
    CaptureFailed,
    #[error("timed out")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("inference failed")]
    InferenceFailed,
    #[error("nutrition computation failed")]
    ComputeFailed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    /// Diagnostic for the operator.
    pub message: String,
}

/// Terminal outcome for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    Success,
    NotRecognized,
    NutritionMissing,
    Failed(ScanErrorKind),
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Success => f.write_str("Success"),
            ScanStatus::NotRecognized => f.write_str("NotRecognized"),
            ScanStatus::NutritionMissing => f.write_str("NutritionMissing"),
            ScanStatus::Failed(kind) => write!(f, "ERROR:{kind:?}"),
        }
    }
}

/// One state entry, stamped relative to session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub state: ScanState,
    pub at_ms: u64,
}

/// Published on every transition. `status` is set on the terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    pub session_id: u64,
    pub state: ScanState,
    pub status: Option<ScanStatus>,
}

/// Everything one scan produced, handed to the caller at a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSession {
    pub id: u64,
    pub state: ScanState,
    /// Weight read during `WEIGHING`.
    pub measured_grams: u32,
    /// Weight used for nutrition scaling (never below the floor).
    pub scaled_grams: u32,
    /// `measured_grams` was under the minimum threshold. Informational.
    pub below_threshold: bool,
    /// Captured still; absent if capture did not complete.
    #[serde(skip)]
    pub image: Option<Frame>,
    /// Ranked classifier output, kept even when nothing was accepted.
    #[serde(serialize_with = "crate::recognition::serialize_candidates")]
    pub candidates: Vec<Candidate>,
    pub recognition: Option<RecognitionResult>,
    pub nutrition: Option<NutritionResult>,
    pub error: Option<ScanError>,
    pub transitions: Vec<Transition>,
    /// Unix milliseconds at session start.
    pub started_at_ms: u64,
}

impl ScanSession {
    pub(crate) fn new(id: u64, started_at_ms: u64) -> Self {
        Self {
            id,
            state: ScanState::Idle,
            measured_grams: 0,
            scaled_grams: 0,
            below_threshold: false,
            image: None,
            candidates: Vec::new(),
            recognition: None,
            nutrition: None,
            error: None,
            transitions: vec![Transition {
                state: ScanState::Idle,
                at_ms: 0,
            }],
            started_at_ms,
        }
    }

    /// Terminal status; `None` while the session is still running, and for
    /// an `ERROR` record that carries no error.
    pub fn status(&self) -> Option<ScanStatus> {
        match self.state {
            ScanState::Error => self.error.as_ref().map(|e| ScanStatus::Failed(e.kind)),
            ScanState::Result if self.recognition.is_none() => Some(ScanStatus::NotRecognized),
            ScanState::Result if self.nutrition.is_none() => Some(ScanStatus::NutritionMissing),
            ScanState::Result => Some(ScanStatus::Success),
            _ => None,
        }
    }

    /// States visited, in order.
    pub fn path(&self) -> Vec<ScanState> {
        self.transitions.iter().map(|t| t.state).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_state_and_payload() {
        let mut s = ScanSession::new(1, 0);
        assert_eq!(s.status(), None);
        s.state = ScanState::Result;
        assert_eq!(s.status(), Some(ScanStatus::NotRecognized));
        s.recognition = Some(RecognitionResult {
            label: "rice".into(),
            confidence: 0.9,
            runners_up: vec![],
        });
        assert_eq!(s.status(), Some(ScanStatus::NutritionMissing));
        s.state = ScanState::Error;
        s.error = Some(ScanError {
            kind: ScanErrorKind::Timeout,
            message: "capture".into(),
        });
        assert_eq!(s.status(), Some(ScanStatus::Failed(ScanErrorKind::Timeout)));
    }

    #[test]
    fn error_state_without_error_has_no_kind() {
        let mut s = ScanSession::new(2, 0);
        s.state = ScanState::Error;
        assert_eq!(s.status(), None);
    }

    #[test]
    fn status_display_matches_presentation_codes() {
        assert_eq!(ScanStatus::Success.to_string(), "Success");
        assert_eq!(
            ScanStatus::Failed(ScanErrorKind::Cancelled).to_string(),
            "ERROR:Cancelled"
        );
        assert_eq!(ScanState::Recognizing.to_string(), "RECOGNIZING");
    }
}
