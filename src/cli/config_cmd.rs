// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.

use crate::config::{self, EffectiveConfig};
use crate::engine::GenerationConfig;

/// Print effective config as key-value pairs to stdout.
pub fn run_show(json: bool) -> i32 {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to serialize config: {}", e);
                return 1;
            }
        }
    } else {
        print_config(&cfg);
    }
    0
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    let generation = GenerationConfig::default();
    println!("COUPONLM_LOG_LEVEL=info");
    println!("COUPONLM_LOG_FORMAT=json");
    println!("COUPONLM_CAPABILITY_TIMEOUT_MS={}", config::DEFAULT_CAPABILITY_TIMEOUT_MS);
    println!("COUPONLM_INTRA_OP_THREADS=0");
    println!("COUPONLM_FETCH_CHUNK_SIZE={}", crate::models::transport::DEFAULT_CHUNK_SIZE);
    println!("COUPONLM_MAX_TOKENS={}", generation.max_tokens);
    println!("COUPONLM_TEMPERATURE={}", generation.temperature);
    println!("COUPONLM_TOP_P={}", generation.top_p);
    println!("COUPONLM_TOP_K={}", generation.top_k);
    println!("COUPONLM_REPETITION_PENALTY={}", generation.repetition_penalty);
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let env = config::load();
    let mut warnings = 0;

    if let Some(e) = &env.file_error {
        eprintln!("WARNING: config file ignored: {}", e);
        warnings += 1;
    }
    if let Err(e) = env.generation.validate() {
        eprintln!("WARNING: generation defaults invalid: {}", e);
        warnings += 1;
    }
    if env.generation.temperature > 2.0 {
        eprintln!(
            "WARNING: COUPONLM_TEMPERATURE ({}) is unusually high; output will be noisy",
            env.generation.temperature
        );
        warnings += 1;
    }

    if warnings == 0 {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn print_config(cfg: &EffectiveConfig) {
    if let Some(path) = &cfg.config_file {
        println!("COUPONLM_CONFIG={}", path.display());
    }
    println!("COUPONLM_LOG_LEVEL={}", cfg.log_level);
    println!("COUPONLM_LOG_FORMAT={:?}", cfg.log_format);
    println!("COUPONLM_CAPABILITY_TIMEOUT_MS={}", cfg.capability_timeout_ms);
    println!("COUPONLM_INTRA_OP_THREADS={}", cfg.intra_op_threads);
    println!("COUPONLM_FETCH_CHUNK_SIZE={}", cfg.fetch_chunk_size);
    println!("COUPONLM_MAX_TOKENS={}", cfg.max_tokens);
    println!("COUPONLM_TEMPERATURE={}", cfg.temperature);
    println!("COUPONLM_TOP_P={}", cfg.top_p);
    println!("COUPONLM_TOP_K={}", cfg.top_k);
    println!("COUPONLM_REPETITION_PENALTY={}", cfg.repetition_penalty);
    if let Some(seed) = cfg.seed {
        println!("COUPONLM_SEED={}", seed);
    }
}
