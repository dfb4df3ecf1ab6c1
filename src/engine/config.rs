// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generation configuration types.
//!
//! All fields have safe defaults. Configuration is validated before use.

use serde::{Deserialize, Serialize};

use super::error::InferenceError;

/// Per-request generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Logit divisor. Must be strictly positive.
    pub temperature: f32,
    /// Nucleus threshold in (0.0, 1.0].
    pub top_p: f32,
    /// Number of highest-probability candidates kept before nucleus filtering.
    pub top_k: u32,
    /// Penalty for tokens already emitted in this generation (1.0 = none).
    pub repetition_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            repetition_penalty: 1.1,
        }
    }
}

impl GenerationConfig {
    /// Validate configuration values. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.max_tokens == 0 {
            return Err(InferenceError::InputValidation(
                "max_tokens must be > 0".into(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(InferenceError::InputValidation(
                "temperature must be a finite value > 0.0".into(),
            ));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(InferenceError::InputValidation(
                "top_p must be in range (0.0, 1.0]".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(InferenceError::InputValidation("top_k must be > 0".into()));
        }
        if !self.repetition_penalty.is_finite() || self.repetition_penalty <= 0.0 {
            return Err(InferenceError::InputValidation(
                "repetition_penalty must be a finite value > 0.0".into(),
            ));
        }
        Ok(())
    }

    /// Near-greedy configuration: a single candidate survives top-k.
    pub fn greedy() -> Self {
        Self {
            top_k: 1,
            top_p: 1.0,
            repetition_penalty: 1.0,
            ..Self::default()
        }
    }
}
