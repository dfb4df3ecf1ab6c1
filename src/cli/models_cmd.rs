// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Models CLI subcommand: load.
//!
//! Loads a descriptor end to end and reports the chosen provider.

use std::time::Instant;

use super::{progress_printer, read_descriptor, runtime_from_env, EXIT_USAGE};

/// Run `load <descriptor>`.
///
/// Returns exit code: 0 on success, 1 on load failure, 2 on bad input.
pub async fn run_load(descriptor_path: &str) -> i32 {
    let descriptor = match read_descriptor(descriptor_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };
    let runtime = match runtime_from_env() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };

    let started = Instant::now();
    let progress = progress_printer(&descriptor.name);
    match runtime.load_model(&descriptor, Some(progress)).await {
        Ok(session) => {
            println!(
                "{:<30} {:<8} {:>10} ms",
                descriptor.name,
                session.provider().to_string(),
                started.elapsed().as_millis()
            );
            runtime.shutdown();
            0
        }
        Err(e) => {
            eprintln!("Failed to load '{}': {}", descriptor.name, e);
            1
        }
    }
}
