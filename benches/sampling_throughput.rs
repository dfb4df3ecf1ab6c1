// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sampling throughput benchmarks.
//!
//! Measures the temperature / top-k / top-p pipeline over vocabulary-sized logits.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use couponlm_core::engine::sampling::{apply_repetition_penalty, softmax, survivors};
use couponlm_core::engine::{GenerationConfig, SamplingEngine, TokenSampler};

fn random_logits(len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(17);
    (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect()
}

fn bench_softmax(c: &mut Criterion) {
    let mut group = c.benchmark_group("softmax");

    for (name, len) in [("vocab_256", 256), ("vocab_32k", 32_000)] {
        let logits = random_logits(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_function(BenchmarkId::new("logits", name), |b| {
            b.iter(|| softmax(black_box(&logits)))
        });
    }

    group.finish();
}

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample");
    let config = GenerationConfig::default();

    for (name, len) in [("vocab_256", 256), ("vocab_32k", 32_000)] {
        let logits = random_logits(len);
        let mut sampler = SamplingEngine::with_seed(1);
        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("draw", name), |b| {
            b.iter(|| sampler.sample(black_box(&logits), black_box(&config)))
        });
    }

    group.finish();
}

fn bench_survivors(c: &mut Criterion) {
    let mut group = c.benchmark_group("survivors");
    let logits = random_logits(32_000);

    for (name, top_k) in [("top_k_1", 1), ("top_k_50", 50), ("top_k_1000", 1000)] {
        let config = GenerationConfig { top_k, ..Default::default() };
        group.bench_function(BenchmarkId::new("filter", name), |b| {
            b.iter(|| survivors(black_box(&logits), black_box(&config)))
        });
    }

    group.finish();
}

fn bench_repetition_penalty(c: &mut Criterion) {
    let logits = random_logits(32_000);
    let history: Vec<u32> = (0..150).map(|i| (i * 211) % 32_000).collect();

    c.bench_function("repetition_penalty_150_tokens", |b| {
        b.iter(|| {
            let mut scores = logits.clone();
            apply_repetition_penalty(&mut scores, black_box(&history), 1.1);
            scores
        })
    });
}

criterion_group!(
    benches,
    bench_softmax,
    bench_sample,
    bench_survivors,
    bench_repetition_penalty
);
criterion_main!(benches);
