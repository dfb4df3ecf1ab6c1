// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metrics recording via the `metrics` facade.
//!
//! No exporter is installed here; the host decides where values go.

use std::time::Duration;

use crate::engine::FinishReason;

/// Record a finished model load.
pub fn record_model_load(model: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!(
        "couponlm_model_loads_total",
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("couponlm_model_load_seconds", "model" => model.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a cache hit that skipped fetch and session creation.
pub fn record_cache_hit(model: &str) {
    metrics::counter!("couponlm_model_cache_hits_total", "model" => model.to_string())
        .increment(1);
}

/// Record bytes pulled from a transport.
pub fn record_bytes_fetched(bytes: u64) {
    metrics::counter!("couponlm_fetch_bytes_total").increment(bytes);
}

/// Record a completed generation.
pub fn record_generation(reason: FinishReason, tokens: u32) {
    metrics::counter!("couponlm_generations_total", "finish_reason" => reason.as_str())
        .increment(1);
    metrics::histogram!("couponlm_generation_tokens").record(f64::from(tokens));
}

/// Record a generation that aborted on an engine error.
pub fn record_generation_failure() {
    metrics::counter!("couponlm_generation_failures_total").increment(1);
}

/// Record a ranking request that fell back to unranked order.
pub fn record_ranking_fallback() {
    metrics::counter!("couponlm_ranking_fallbacks_total").increment(1);
}
