// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generation output types.

/// Result of text generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Decoded text of every emitted token (EOS excluded).
    pub text: String,
    /// Number of tokens emitted.
    pub tokens_generated: u32,
    /// Reason generation stopped.
    pub finish_reason: FinishReason,
}

/// Reason why text generation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Model emitted stop token naturally.
    Stop,
    /// Hit max_tokens limit.
    MaxTokens,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::MaxTokens => "max_tokens",
        }
    }
}
