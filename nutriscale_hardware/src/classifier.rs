use nutriscale_traits::{AbortSignal, BoxError, ScoreModel};
use tracing::debug;

/// Stand-in for the on-device model.
///
/// The top class is chosen from a hash of the input tensor, so the same image
/// always yields the same scores. The other classes split the remaining
/// probability mass geometrically.
#[derive(Debug, Clone)]
pub struct SimulatedModel {
    classes: usize,
    confidence: f32,
}

impl SimulatedModel {
    pub fn new(classes: usize, confidence: f32) -> Self {
        Self {
            classes,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn classes(&self) -> usize {
        self.classes
    }
}

/// 64-bit FNV-1a over the bit patterns of `input`; stable across builds and platforms.
fn fnv1a(input: &[f32]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for v in input {
        for b in v.to_bits().to_le_bytes() {
            h ^= u64::from(b);
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    h
}

impl ScoreModel for SimulatedModel {
    fn scores(&mut self, input: &[f32], abort: &AbortSignal) -> Result<Vec<f32>, BoxError> {
        if abort.is_raised() {
            return Err("inference aborted".into());
        }
        let n = self.classes;
        if n == 0 {
            return Ok(Vec::new());
        }
        let top = (fnv1a(input) % n as u64) as usize;
        let mut out = vec![0.0; n];
        out[top] = self.confidence;
        let mut rest = 1.0 - self.confidence;
        for i in 1..n {
            rest /= 2.0;
            out[(top + i) % n] = rest;
        }
        debug!(top, confidence = self.confidence, "simulated inference");
        Ok(out)
    }
}
