// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the sampling pipeline.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use couponlm_core::engine::sampling::{apply_repetition_penalty, survivors};
use couponlm_core::engine::{GenerationConfig, SamplingEngine, TokenSampler};

fn config(temperature: f32, top_k: u32, top_p: f32) -> GenerationConfig {
    GenerationConfig { temperature, top_k, top_p, ..Default::default() }
}

// === Survivor sets ===

#[test]
fn samples_stay_within_top_k_and_top_p_survivors() {
    let mut logits_rng = StdRng::seed_from_u64(11);
    let mut sampler = SamplingEngine::with_seed(5);

    for round in 0..50 {
        let len = logits_rng.gen_range(1..200);
        let logits: Vec<f32> = (0..len).map(|_| logits_rng.gen_range(-8.0..8.0)).collect();
        let config = config(
            logits_rng.gen_range(0.1..2.0),
            logits_rng.gen_range(1..60),
            logits_rng.gen_range(0.05..=1.0),
        );
        let allowed: HashSet<usize> = survivors(&logits, &config).into_iter().collect();
        assert!(!allowed.is_empty());
        assert!(allowed.len() <= config.top_k as usize);

        for _ in 0..40 {
            let token = sampler.sample(&logits, &config) as usize;
            assert!(token < len, "round {}: token {} out of range", round, token);
            assert!(allowed.contains(&token), "round {}: token {} filtered out", round, token);
        }
    }
}

#[test]
fn top_k_one_is_greedy() {
    let logits = [0.1, 3.0, 2.9, -1.0];
    let mut sampler = SamplingEngine::with_seed(1);
    for _ in 0..100 {
        assert_eq!(sampler.sample(&logits, &config(1.5, 1, 1.0)), 1);
    }
}

#[test]
fn tiny_top_p_keeps_the_leader() {
    let logits = [1.0, 1.5, 4.0, 0.5];
    assert_eq!(survivors(&logits, &config(1.0, 50, 0.01)), vec![2]);
}

// === Determinism ===

#[test]
fn same_seed_same_draws() {
    let logits: Vec<f32> = (0..32).map(|i| (i as f32 * 0.37).sin()).collect();
    let config = config(0.9, 20, 0.95);
    let mut a = SamplingEngine::with_seed(99);
    let mut b = SamplingEngine::with_seed(99);
    let draws_a: Vec<u32> = (0..64).map(|_| a.sample(&logits, &config)).collect();
    let draws_b: Vec<u32> = (0..64).map(|_| b.sample(&logits, &config)).collect();
    assert_eq!(draws_a, draws_b);
}

#[test]
fn low_temperature_concentrates_mass() {
    let logits = [2.0, 1.8, 1.6, 1.4];
    let mut sampler = SamplingEngine::with_seed(3);
    let cold = config(0.02, 4, 1.0);
    let hits = (0..500).filter(|_| sampler.sample(&logits, &cold) == 0).count();
    assert!(hits > 495, "argmax drawn {} of 500 times", hits);
}

// === Degenerate logits ===

#[test]
fn degenerate_logits_never_panic() {
    let mut sampler = SamplingEngine::with_seed(8);
    let config = GenerationConfig::default();
    assert_eq!(sampler.sample(&[], &config), 0);
    assert_eq!(sampler.sample(&[f32::NAN], &config), 0);
    assert!(sampler.sample(&[f32::NAN, f32::NEG_INFINITY, 1.0], &config) == 2);
    assert!(sampler.sample(&[f32::NEG_INFINITY; 4], &config) < 4);
}

// === Repetition penalty ===

#[test]
fn repetition_penalty_shifts_choice_away_from_repeats() {
    let mut logits = vec![3.0, 2.5, 0.0];
    apply_repetition_penalty(&mut logits, &[0], 2.0);
    let mut sampler = SamplingEngine::with_seed(4);
    assert_eq!(sampler.sample(&logits, &config(1.0, 1, 1.0)), 1);
}

#[test]
fn neutral_penalty_leaves_logits_untouched() {
    let mut logits = vec![3.0, -2.5, 0.0];
    apply_repetition_penalty(&mut logits, &[0, 1, 2], 1.0);
    assert_eq!(logits, vec![3.0, -2.5, 0.0]);
}
