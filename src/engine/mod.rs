// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference engine module for couponlm.
//!
//! Handles tokenization, sampling, provider selection and the generation
//! loop. Sessions come from an [`InferenceBackend`]; the candle-onnx one is
//! compiled in with the `onnx` feature.

pub mod config;
pub mod error;
pub mod generation;
pub mod input;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod output;
pub mod provider;
pub mod sampling;
pub mod session;
pub mod tensor;
pub mod tokenizer;

mod streaming;

pub use config::GenerationConfig;
pub use error::InferenceError;
pub use generation::{DecoderIo, GenerationLoop, GenerationState, StepOutcome};
pub use input::{format_prompt, ChatMessage, ChatRole, MAX_TEXT_BYTES};
pub use output::{FinishReason, GenerationResult};
pub use provider::{
    CapabilityCheck, CapabilityError, ExecutionProvider, ProviderPreference, ProviderSelector,
    StaticCapability, SystemCapability,
};
pub use sampling::{SamplingEngine, TokenSampler};
pub use session::{
    default_backend, ExecutionMode, GraphOptimizationLevel, InferenceBackend, InferenceSession,
    SessionOptions, UnavailableBackend,
};
pub use streaming::{StreamEvent, TextStream, TextStreamSender};
pub use tensor::{Tensor, TensorData, TensorMap};
pub use tokenizer::{Tokenizer, TokenizerError, VocabTokenizer, Vocabulary};

#[cfg(feature = "onnx")]
pub use onnx::{CandleOnnxBackend, CandleOnnxSession};
