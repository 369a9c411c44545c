//! Random fallback scores for when no classifier model is available.
//!
//! Keeps the UI demonstrable without the real model: each label gets an
//! independent uniform draw scaled by a per-emotion ceiling. Results from
//! this path carry `ScoreSource::Fallback` so callers can tell them apart
//! from genuine inference.

use crate::types::{Emotion, LABEL_ORDER};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default ceiling for the neutral label.
pub const DEFAULT_NEUTRAL_CEILING: f32 = 0.9;
/// Default ceiling for every other label.
pub const DEFAULT_FALLBACK_CEILING: f32 = 0.7;

/// Synthesizes plausible-looking emotion scores.
pub struct FallbackScorer {
    rng: StdRng,
    neutral_ceiling: f32,
    default_ceiling: f32,
}

impl FallbackScorer {
    pub fn new(neutral_ceiling: f32, default_ceiling: f32) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            neutral_ceiling,
            default_ceiling,
        }
    }

    /// Deterministic scorer for tests.
    pub fn with_seed(seed: u64, neutral_ceiling: f32, default_ceiling: f32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            neutral_ceiling,
            default_ceiling,
        }
    }

    fn ceiling(&self, emotion: Emotion) -> f32 {
        if emotion == Emotion::Neutral {
            self.neutral_ceiling
        } else {
            self.default_ceiling
        }
    }

    /// Seven uniform draws in label order, each scaled by its ceiling.
    pub fn scores(&mut self) -> [f32; 7] {
        let mut out = [0.0f32; 7];
        for (i, &emotion) in LABEL_ORDER.iter().enumerate() {
            out[i] = self.rng.gen::<f32>() * self.ceiling(emotion);
        }
        out
    }
}

impl Default for FallbackScorer {
    fn default() -> Self {
        Self::new(DEFAULT_NEUTRAL_CEILING, DEFAULT_FALLBACK_CEILING)
    }
}
