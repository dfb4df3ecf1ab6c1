// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry module for couponlm.
//!
//! Structured logging, spans and metrics. All output goes to local sinks;
//! nothing here opens a network connection.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_bytes_fetched, record_cache_hit, record_generation, record_generation_failure,
    record_model_load, record_ranking_fallback,
};
pub use spans::{generation_span, load_span, SpanExt};
