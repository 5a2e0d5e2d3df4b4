//! Classifier adapter: turns raw model output into ranked candidates and
//! decides whether the top one is accepted.

use nutriscale_traits::{AbortSignal, BoxError, Candidate, Classifier, Frame, ScoreModel};
use serde::Serialize;

/// Accepted top-1 label with the rest of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    pub label: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    #[serde(serialize_with = "serialize_candidates")]
    pub runners_up: Vec<Candidate>,
}

#[derive(Serialize)]
struct CandidateRef<'a> {
    label: &'a str,
    confidence: f32,
}

pub(crate) fn serialize_candidates<S>(c: &[Candidate], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_seq(c.iter().map(|c| CandidateRef {
        label: &c.label,
        confidence: c.confidence,
    }))
}

/// Clean up classifier output: drop NaN, clamp to `[0, 1]`, sort by
/// descending confidence (ties keep input order) and keep `top_k`.
pub fn normalize_candidates(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
    candidates.retain(|c| !c.confidence.is_nan());
    for c in &mut candidates {
        c.confidence = c.confidence.clamp(0.0, 1.0);
    }
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(top_k);
    candidates
}

/// Accept the top candidate if it reaches `threshold`.
pub fn accept(candidates: &[Candidate], threshold: f32) -> Option<RecognitionResult> {
    let (top, rest) = candidates.split_first()?;
    if top.confidence < threshold {
        return None;
    }
    Some(RecognitionResult {
        label: top.label.clone(),
        confidence: top.confidence,
        runners_up: rest.to_vec(),
    })
}

/// Map a model's score vector onto `labels` and keep the best `k`.
///
/// Scores beyond the label list are ignored; labels beyond the scores get no
/// candidate.
pub fn rank_scores(scores: &[f32], labels: &[String], k: usize) -> Vec<Candidate> {
    let candidates = scores
        .iter()
        .zip(labels)
        .map(|(&s, l)| Candidate::new(l.clone(), s))
        .collect();
    normalize_candidates(candidates, k)
}

/// Resize `frame` to `size`×`size` (nearest neighbour) and scale channels to
/// `[0, 1]`, row-major RGB. Empty when `size` is 0 or the frame is empty.
pub fn preprocess(frame: &Frame, size: u32) -> Vec<f32> {
    let (w, h) = (frame.width(), frame.height());
    if size == 0 || w == 0 || h == 0 {
        return Vec::new();
    }
    let n = size as usize;
    let mut out = Vec::with_capacity(n * n * 3);
    for y in 0..size {
        let sy = (u64::from(y) * u64::from(h) / u64::from(size)) as u32;
        for x in 0..size {
            let sx = (u64::from(x) * u64::from(w) / u64::from(size)) as u32;
            let [r, g, b] = frame.pixel(sx, sy).unwrap_or([0, 0, 0]);
            out.extend([r, g, b].map(|c| f32::from(c) / 255.0));
        }
    }
    out
}

/// `Classifier` over a raw score model: preprocess, score, rank.
#[derive(Debug, Clone)]
pub struct ModelClassifier<M> {
    model: M,
    labels: Vec<String>,
    input_size: u32,
}

impl<M: ScoreModel> ModelClassifier<M> {
    /// `labels` must be in the model's output order.
    pub fn new(model: M, labels: Vec<String>, input_size: u32) -> Self {
        Self {
            model,
            labels,
            input_size,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl<M: ScoreModel> Classifier for ModelClassifier<M> {
    fn classify(
        &mut self,
        frame: &Frame,
        top_k: usize,
        abort: &AbortSignal,
    ) -> Result<Vec<Candidate>, BoxError> {
        let input = preprocess(frame, self.input_size);
        if input.is_empty() {
            return Err("empty frame".into());
        }
        if abort.is_raised() {
            return Err("inference aborted".into());
        }
        let scores = self.model.scores(&input, abort)?;
        if scores.len() != self.labels.len() {
            tracing::warn!(
                scores = scores.len(),
                labels = self.labels.len(),
                "model output does not match the label list"
            );
        }
        Ok(rank_scores(&scores, &self.labels, top_k))
    }
}
