// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Next-token sampling: temperature, top-k, top-p and weighted draw.
//!
//! The pipeline is split into pure helpers so each numerically sensitive
//! step can be checked on its own. [`SamplingEngine`] owns the RNG and
//! composes them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::GenerationConfig;

/// Picks the next token from raw output scores.
pub trait TokenSampler: Send {
    /// Select a token index. Never fails.
    fn sample(&mut self, logits: &[f32], config: &GenerationConfig) -> u32;
}

/// Numerically stable softmax.
///
/// NaN scores are treated as negative infinity. If no score is finite the
/// result is uniform.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let cleaned: Vec<f32> = logits
        .iter()
        .map(|&x| if x.is_nan() { f32::NEG_INFINITY } else { x })
        .collect();
    let max = cleaned.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        if max == f32::INFINITY {
            // Every +inf entry shares the mass.
            let count = cleaned.iter().filter(|&&x| x == f32::INFINITY).count() as f32;
            return cleaned
                .iter()
                .map(|&x| if x == f32::INFINITY { 1.0 / count } else { 0.0 })
                .collect();
        }
        let uniform = 1.0 / cleaned.len() as f32;
        return vec![uniform; cleaned.len()];
    }

    let exps: Vec<f32> = cleaned.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Indices of the `k` highest probabilities, sorted descending.
///
/// Ties keep the lower index first.
pub fn top_k_indices(probs: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]).then(a.cmp(&b)));
    indices.truncate(k.max(1).min(probs.len()));
    indices
}

/// Nucleus filter over a candidate set.
///
/// Candidates are re-sorted by probability descending and the shortest
/// prefix whose cumulative probability reaches `top_p` is kept, including
/// the element that crosses the threshold.
pub fn top_p_filter(probs: &[f32], candidates: &[usize], top_p: f32) -> Vec<usize> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]).then(a.cmp(&b)));

    let mut cumulative = 0.0f32;
    let mut keep = sorted.len();
    for (i, &idx) in sorted.iter().enumerate() {
        cumulative += probs[idx];
        if cumulative >= top_p {
            keep = i + 1;
            break;
        }
    }
    sorted.truncate(keep.max(1));
    sorted
}

/// Draw from the survivors proportionally to their renormalized weight.
///
/// `draw` is a uniform value in `[0, 1)`. Falls back to the first survivor
/// if rounding keeps the cumulative sum below the draw.
pub fn weighted_choice(probs: &[f32], survivors: &[usize], draw: f32) -> usize {
    let Some(&first) = survivors.first() else {
        return 0;
    };
    let total: f32 = survivors.iter().map(|&i| probs[i]).sum();
    if total.is_nan() || total <= 0.0 || total.is_infinite() {
        return first;
    }

    let mut cumulative = 0.0f32;
    for &idx in survivors {
        cumulative += probs[idx] / total;
        if draw < cumulative {
            return idx;
        }
    }
    first
}

/// Probabilities after temperature scaling and softmax.
pub fn probabilities(logits: &[f32], temperature: f32) -> Vec<f32> {
    let scaled: Vec<f32> = logits.iter().map(|&x| x / temperature).collect();
    softmax(&scaled)
}

/// Indices that survive top-k then top-p for the given config.
pub fn survivors(logits: &[f32], config: &GenerationConfig) -> Vec<usize> {
    if logits.is_empty() {
        return Vec::new();
    }
    let probs = probabilities(logits, config.temperature);
    let candidates = top_k_indices(&probs, config.top_k as usize);
    top_p_filter(&probs, &candidates, config.top_p)
}

/// Penalize tokens that were already emitted.
///
/// Positive scores are divided by `penalty`, negative ones multiplied, so a
/// penalty above 1.0 always makes a repeat less likely. Ids outside the
/// logits range are ignored.
pub fn apply_repetition_penalty(logits: &mut [f32], history: &[u32], penalty: f32) {
    if penalty == 1.0 || history.is_empty() {
        return;
    }
    let mut seen = vec![false; logits.len()];
    for &token in history {
        let idx = token as usize;
        if idx >= logits.len() || seen[idx] {
            continue;
        }
        seen[idx] = true;
        let score = logits[idx];
        logits[idx] = if score > 0.0 { score / penalty } else { score * penalty };
    }
}

/// Temperature / top-k / top-p sampler.
pub struct SamplingEngine {
    rng: StdRng,
}

impl SamplingEngine {
    /// Sampler seeded from OS entropy.
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Deterministic sampler for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Sampler seeded when `seed` is set, from entropy otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }
}

impl Default for SamplingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSampler for SamplingEngine {
    fn sample(&mut self, logits: &[f32], config: &GenerationConfig) -> u32 {
        if logits.is_empty() {
            return 0;
        }
        let probs = probabilities(logits, config.temperature);
        let candidates = top_k_indices(&probs, config.top_k as usize);
        let kept = top_p_filter(&probs, &candidates, config.top_p);
        let draw: f32 = self.rng.gen();
        weighted_choice(&probs, &kept, draw) as u32
    }
}
