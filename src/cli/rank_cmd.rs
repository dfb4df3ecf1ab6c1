// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rank CLI subcommand: score a coupon file against a cart total.

use super::{read_descriptor, runtime_from_env, EXIT_USAGE};
use crate::ranking::{unranked, Coupon};

/// Run `rank <descriptor> <coupons.json> <cart_total>`.
///
/// Falls back to unranked order when the model cannot be loaded or run.
pub async fn run_rank(descriptor_path: &str, coupons_path: &str, cart_total: &str) -> i32 {
    let cart_total: f64 = match cart_total.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Error: cart total must be a number, got '{}'", cart_total);
            return EXIT_USAGE;
        }
    };
    let coupons: Vec<Coupon> = match std::fs::read_to_string(coupons_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to read coupons from {}: {}", coupons_path, e);
            return EXIT_USAGE;
        }
    };
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

    let ranked = match runtime.load_model(&descriptor, None).await {
        Ok(_) => match runtime.ranker(&descriptor.name) {
            Ok(ranker) => ranker.rank_or_unranked(&coupons, cart_total).await,
            Err(e) => {
                eprintln!("WARNING: {}; showing unranked coupons", e);
                unranked(&coupons)
            }
        },
        Err(e) => {
            eprintln!("WARNING: ranking model unavailable ({}); showing unranked coupons", e);
            unranked(&coupons)
        }
    };
    runtime.shutdown();

    match serde_json::to_string_pretty(&ranked) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Failed to serialize results: {}", e);
            1
        }
    }
}
