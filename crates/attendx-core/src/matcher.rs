use serde::Serialize;

use crate::embedding::{Embedding, EMBEDDING_LEN};
use crate::errors::{AppError, AppResult, EmbeddingSide};

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 72.0;

/// Decision knobs. Both gates must pass for a match.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub match_threshold: f64,
    pub min_confidence: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MatchDecision {
    pub distance: f64,
    pub confidence: f64,
    pub is_match: bool,
}

impl MatchPolicy {
    /// Compares a stored embedding against a live probe. Deterministic,
    /// no side effects. Confidence is `(1 - distance) * 100` and is NOT
    /// clamped at zero: a distance above 1 yields a negative confidence.
    /// Callers must tolerate that; it is inherited behavior, kept as is.
    pub fn compare(&self, stored: &Embedding, probe: &Embedding) -> AppResult<MatchDecision> {
        ensure_shape(stored, EmbeddingSide::Stored)?;
        ensure_shape(probe, EmbeddingSide::Probe)?;

        let distance = euclidean_distance(stored.values(), probe.values());
        let confidence = (1.0 - distance) * 100.0;
        let is_match = distance <= self.match_threshold && confidence >= self.min_confidence;

        Ok(MatchDecision {
            distance,
            confidence,
            is_match,
        })
    }
}

fn ensure_shape(embedding: &Embedding, side: EmbeddingSide) -> AppResult<()> {
    if embedding.len() != EMBEDDING_LEN {
        return Err(AppError::MalformedEmbedding {
            side,
            expected: EMBEDDING_LEN,
            found: embedding.len(),
        });
    }
    Ok(())
}

pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let diff = l - r;
        sum += diff * diff;
    }
    sum.sqrt()
}
