// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tokenizer throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use couponlm_core::engine::{Tokenizer, VocabTokenizer};

const SENTENCE: &str = "Find the best coupon code for free shipping on my order today ";

fn bench_encode(c: &mut Criterion) {
    let tokenizer = VocabTokenizer::default();
    let mut group = c.benchmark_group("encode");

    for (name, repeats) in [("short", 1), ("paragraph", 20), ("long", 200)] {
        let text = SENTENCE.repeat(repeats);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_function(BenchmarkId::new("text", name), |b| {
            b.iter(|| tokenizer.encode(black_box(&text)))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let tokenizer = VocabTokenizer::default();
    let mut group = c.benchmark_group("decode");

    for (name, repeats) in [("short", 1), ("paragraph", 20), ("long", 200)] {
        let ids = tokenizer.encode(&SENTENCE.repeat(repeats));
        group.throughput(Throughput::Elements(ids.len() as u64));
        group.bench_function(BenchmarkId::new("ids", name), |b| {
            b.iter(|| tokenizer.decode(black_box(&ids)))
        });
    }

    group.finish();
}

fn bench_decode_incremental(c: &mut Criterion) {
    let tokenizer = VocabTokenizer::default();
    let ids = tokenizer.encode(&SENTENCE.repeat(10));

    c.bench_function("decode_incremental_last_token", |b| {
        let (&last, previous) = ids.split_last().unwrap();
        b.iter(|| tokenizer.decode_incremental(black_box(previous), black_box(last)))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_decode_incremental);
criterion_main!(benches);
