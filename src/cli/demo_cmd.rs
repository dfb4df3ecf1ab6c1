// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Offline demo subcommands: tokenize, sample-demo.
//!
//! Neither needs a model; both exercise the engine's pure parts.

use crate::config;
use crate::engine::sampling::{probabilities, survivors};
use crate::engine::{SamplingEngine, TokenSampler, Tokenizer, VocabTokenizer};

/// Logits used by `sample-demo`: a peaked head and a long flat tail.
const DEMO_LOGITS: [f32; 10] = [4.0, 3.2, 2.5, 1.0, 0.5, 0.0, -0.5, -1.0, -2.0, -4.0];
const DEMO_DRAWS: usize = 1000;

/// Run `tokenize <text>`: print ids, surface tokens and the round trip.
pub fn run_tokenize(text: &str) -> i32 {
    let tokenizer = VocabTokenizer::default();
    let ids = tokenizer.encode(text);

    println!("{:>6}  TOKEN", "ID");
    for &id in &ids {
        let token = tokenizer
            .vocabulary()
            .token(id)
            .unwrap_or_else(|| "<?>".to_string());
        println!("{:>6}  {}", id, token);
    }
    println!();
    println!("tokens:  {}", ids.len());
    println!("decoded: {}", tokenizer.decode(&ids));
    0
}

/// Run `sample-demo`: show the filter pipeline on fixed logits and a draw
/// histogram using the configured generation defaults.
pub fn run_sample_demo() -> i32 {
    let env = config::load();
    let generation = &env.generation;
    if let Err(e) = generation.validate() {
        eprintln!("Error: {}", e);
        return super::EXIT_USAGE;
    }

    let probs = probabilities(&DEMO_LOGITS, generation.temperature);
    let kept = survivors(&DEMO_LOGITS, generation);
    let mut sampler = SamplingEngine::from_seed_option(env.seed);
    let mut counts = [0usize; DEMO_LOGITS.len()];
    for _ in 0..DEMO_DRAWS {
        counts[sampler.sample(&DEMO_LOGITS, generation) as usize] += 1;
    }

    println!(
        "temperature={} top_k={} top_p={}",
        generation.temperature, generation.top_k, generation.top_p
    );
    println!("{:>5} {:>8} {:>8} {:>6} {:>7}", "INDEX", "LOGIT", "PROB", "KEPT", "DRAWS");
    for (i, &logit) in DEMO_LOGITS.iter().enumerate() {
        println!(
            "{:>5} {:>8.2} {:>8.4} {:>6} {:>7}",
            i,
            logit,
            probs[i],
            if kept.contains(&i) { "yes" } else { "-" },
            counts[i]
        );
    }
    0
}
