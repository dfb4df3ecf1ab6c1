// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities and extension traits for couponlm tracing.
//!
//! Provides standardized span creation and result recording.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Span for a model load on cache miss.
///
/// `status`, `error.message` and `bytes` are filled in after completion.
pub fn load_span(model: &str, uri: &str) -> Span {
    info_span!(
        "model_load",
        model = %model,
        uri = %uri,
        status = tracing::field::Empty,
        error.message = tracing::field::Empty,
        bytes = tracing::field::Empty,
    )
}

/// Span for one generation request.
///
/// The id is assigned at prefill, so `generation_id` is recorded later along
/// with `tokens_generated` and `finish_reason`.
pub fn generation_span() -> Span {
    info_span!(
        "generation",
        generation_id = tracing::field::Empty,
        status = tracing::field::Empty,
        error.message = tracing::field::Empty,
        tokens_generated = tracing::field::Empty,
        finish_reason = tracing::field::Empty,
    )
}
