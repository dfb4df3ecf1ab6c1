// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference error types for couponlm.
//!
//! Sampling and tokenization never fail; everything that can go wrong while
//! running a session or driving a generation lands here.

use thiserror::Error;

/// Errors that can occur during inference operations.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Input validation failed: {0}")]
    InputValidation(String),

    #[error("Model error: {0}")]
    ModelError(String),

    /// This build has no engine able to do what was asked.
    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(String),

    #[error("Generation cancelled")]
    Cancelled,
}
